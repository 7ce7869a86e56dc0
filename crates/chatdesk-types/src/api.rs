use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Conversation, ConversationState};

// -- Conversations --

/// Posted fields for `POST /conversations`. Only `username` is read;
/// everything else a client sends is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct StartConversationRequest {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartConversationResponse {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LiveConversationsResponse {
    pub conversations: Vec<Conversation>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub message: String,
    /// Single-character role code; defaults to the client role.
    #[serde(default)]
    pub user: Option<String>,
}

// -- Updates --

/// Conversation reference inside an updates payload. Clients have sent both
/// bare numbers and strings here, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Number(i64),
    Text(String),
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One element of the JSON array embedded in `conversations/updates/<json>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEntry {
    pub id: EntryId,
    /// The `last_edit` the client last saw. Absent means "send me everything now".
    #[serde(default)]
    pub last_edit: Option<DateTime<Utc>>,
    /// Highest message id the client already holds.
    #[serde(default)]
    pub last_message_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatesResponse {
    /// False when the wait ran out without any listed conversation changing.
    pub updated: bool,
    pub conversations: Vec<ConversationState>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
