use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who wrote a message. Persisted as a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "c")]
    Client,
    #[serde(rename = "m")]
    Manager,
}

impl Role {
    pub fn as_char(self) -> char {
        match self {
            Self::Client => 'c',
            Self::Manager => 'm',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "c" => Some(Self::Client),
            "m" => Some(Self::Manager),
            _ => None,
        }
    }
}

/// A thread between a client and (once claimed) a manager.
/// `id` is the capability token handed to the client at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub manager_id: Option<i64>,
    pub username: String,
    pub last_edit: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub user: Role,
    pub message: String,
    pub conversation_id: String,
    pub time_stamp: DateTime<Utc>,
}

/// What a long-poll hands back for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub id: String,
    pub manager_id: Option<i64>,
    pub username: String,
    pub last_edit: DateTime<Utc>,
    pub message_count: i64,
    pub messages_since: Vec<Message>,
}
