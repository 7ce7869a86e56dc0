//! Request path classification.
//!
//! Grammar, first match wins, literal segments case-insensitive:
//!
//! ```text
//! conversations[/]                -> NewConversation
//! conversations/messages          -> SendMessage
//! conversations/updates/<json>    -> CheckUpdates
//! conversations/live              -> LiveConversations
//! conversations/<other>           -> InvalidConversationPath
//! manager[/...]                   -> ManagerAction
//! user[/...]                      -> UserAction
//! <other>                         -> InvalidBasePath
//! ```
//!
//! `<json>` is everything after `conversations/updates/`. It is handed to
//! the JSON decoder as-is, so values containing `/` survive intact.

use chatdesk_types::api::UpdateEntry;
use thiserror::Error;

/// Conversations a single update request may watch.
pub const MAX_UPDATE_ENTRIES: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    NewConversation,
    /// Target conversation travels in the request body.
    SendMessage,
    CheckUpdates { updates: Vec<UpdateEntry> },
    LiveConversations,
    ManagerAction { segments: Vec<String> },
    UserAction { segments: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("invalid base level path")]
    InvalidBasePath,
    #[error("invalid conversations path")]
    InvalidConversationPath,
    #[error("invalid updates payload: {0}")]
    InvalidUpdates(String),
}

pub fn resolve(path: &str) -> Result<RouteDecision, RouteError> {
    let path = path.trim_start_matches('/');
    let (base, rest) = split_segment(path);

    if base.eq_ignore_ascii_case("conversations") {
        resolve_conversations(rest)
    } else if base.eq_ignore_ascii_case("manager") {
        Ok(RouteDecision::ManagerAction {
            segments: segments(rest),
        })
    } else if base.eq_ignore_ascii_case("user") {
        Ok(RouteDecision::UserAction {
            segments: segments(rest),
        })
    } else {
        Err(RouteError::InvalidBasePath)
    }
}

fn resolve_conversations(rest: Option<&str>) -> Result<RouteDecision, RouteError> {
    let (action, remainder) = split_segment(rest.unwrap_or(""));
    let action = action.to_ascii_lowercase();

    match action.as_str() {
        "" if is_blank(remainder) => Ok(RouteDecision::NewConversation),
        "messages" if is_blank(remainder) => Ok(RouteDecision::SendMessage),
        "live" if is_blank(remainder) => Ok(RouteDecision::LiveConversations),
        "updates" => decode_updates(remainder.unwrap_or("")),
        _ => Err(RouteError::InvalidConversationPath),
    }
}

fn decode_updates(raw: &str) -> Result<RouteDecision, RouteError> {
    // A JSON array ends in `]`, so trailing slashes can never belong to it.
    let raw = raw.trim_end_matches('/');
    if raw.trim().is_empty() {
        return Err(RouteError::InvalidUpdates("missing updates payload".into()));
    }

    let updates: Vec<UpdateEntry> =
        serde_json::from_str(raw).map_err(|e| RouteError::InvalidUpdates(e.to_string()))?;
    if updates.is_empty() {
        return Err(RouteError::InvalidUpdates("no conversations listed".into()));
    }
    if updates.len() > MAX_UPDATE_ENTRIES {
        return Err(RouteError::InvalidUpdates(format!(
            "at most {} conversations per request, got {}",
            MAX_UPDATE_ENTRIES,
            updates.len()
        )));
    }

    Ok(RouteDecision::CheckUpdates { updates })
}

fn split_segment(path: &str) -> (&str, Option<&str>) {
    match path.split_once('/') {
        Some((head, tail)) => (head, Some(tail)),
        None => (path, None),
    }
}

fn is_blank(rest: Option<&str>) -> bool {
    rest.is_none_or(|r| r.chars().all(|c| c == '/'))
}

fn segments(rest: Option<&str>) -> Vec<String> {
    rest.unwrap_or("")
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdesk_types::api::EntryId;

    fn updates_path(json: &str) -> String {
        format!("conversations/updates/{}", json)
    }

    #[test]
    fn connect_path() {
        assert_eq!(resolve("conversations"), Ok(RouteDecision::NewConversation));
        assert_eq!(resolve("conversations/"), Ok(RouteDecision::NewConversation));
        assert_eq!(resolve("/conversations"), Ok(RouteDecision::NewConversation));
    }

    #[test]
    fn literal_segments_ignore_case() {
        assert_eq!(resolve("CONVERSATIONS"), resolve("conversations"));
        assert_eq!(resolve("Conversations/Messages"), Ok(RouteDecision::SendMessage));
        assert_eq!(resolve("conversations/LIVE/"), Ok(RouteDecision::LiveConversations));
    }

    #[test]
    fn send_message_path() {
        assert_eq!(resolve("conversations/messages"), Ok(RouteDecision::SendMessage));
        assert_eq!(resolve("conversations/messages/"), Ok(RouteDecision::SendMessage));
    }

    #[test]
    fn updates_payload_is_decoded() {
        let decision = resolve(&updates_path(r#"[{"id":3}]"#)).unwrap();
        let RouteDecision::CheckUpdates { updates } = decision else {
            panic!("expected CheckUpdates, got {:?}", decision);
        };
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].id, EntryId::Number(3));
    }

    #[test]
    fn slash_inside_json_is_not_a_separator() {
        let decision = resolve(&updates_path(r#"[{"id":"1/2"}]"#)).unwrap();
        let RouteDecision::CheckUpdates { updates } = decision else {
            panic!("expected CheckUpdates, got {:?}", decision);
        };
        assert_eq!(updates[0].id, EntryId::Text("1/2".into()));
    }

    #[test]
    fn json_payload_keeps_its_case() {
        let decision = resolve(&format!(
            "CONVERSATIONS/UPDATES/{}",
            r#"[{"id":"AbC","last_edit":"2013-01-01T10:10:10Z","last_message_id":2}]"#
        ))
        .unwrap();
        let RouteDecision::CheckUpdates { updates } = decision else {
            panic!("expected CheckUpdates, got {:?}", decision);
        };
        assert_eq!(updates[0].id, EntryId::Text("AbC".into()));
        assert!(updates[0].last_edit.is_some());
        assert_eq!(updates[0].last_message_id, Some(2));
    }

    #[test]
    fn bad_updates_payloads() {
        let paths = vec![
            "conversations/updates".to_string(),
            "conversations/updates/".to_string(),
            updates_path("[]"),
            updates_path("not json"),
            updates_path(r#"{"id":3}"#),
            updates_path(r#"[{"no_id":3}]"#),
        ];
        for path in paths {
            assert!(
                matches!(resolve(&path), Err(RouteError::InvalidUpdates(_))),
                "{} should be rejected",
                path
            );
        }
    }

    #[test]
    fn updates_payload_size_is_capped() {
        let entries = |n: usize| {
            let ids: Vec<String> = (0..n).map(|i| format!(r#"{{"id":{}}}"#, i)).collect();
            updates_path(&format!("[{}]", ids.join(",")))
        };

        assert!(matches!(
            resolve(&entries(MAX_UPDATE_ENTRIES)),
            Ok(RouteDecision::CheckUpdates { updates }) if updates.len() == MAX_UPDATE_ENTRIES
        ));
        assert!(matches!(
            resolve(&entries(MAX_UPDATE_ENTRIES + 1)),
            Err(RouteError::InvalidUpdates(_))
        ));
    }

    #[test]
    fn invalid_base_path() {
        assert_eq!(resolve("wrong"), Err(RouteError::InvalidBasePath));
        assert_eq!(resolve(""), Err(RouteError::InvalidBasePath));
        assert_eq!(resolve("/"), Err(RouteError::InvalidBasePath));
        assert_eq!(resolve("conversationsx"), Err(RouteError::InvalidBasePath));
        assert_eq!(
            RouteError::InvalidBasePath.to_string(),
            "invalid base level path"
        );
    }

    #[test]
    fn invalid_conversation_path() {
        assert_eq!(resolve("conversations/3/wrong"), Err(RouteError::InvalidConversationPath));
        assert_eq!(resolve("conversations/messages/3"), Err(RouteError::InvalidConversationPath));
        assert_eq!(resolve("conversations//x"), Err(RouteError::InvalidConversationPath));
        assert_eq!(
            RouteError::InvalidConversationPath.to_string(),
            "invalid conversations path"
        );
    }

    #[test]
    fn live_conversations_path() {
        assert_eq!(resolve("conversations/live"), Ok(RouteDecision::LiveConversations));
    }

    #[test]
    fn manager_and_user_carry_their_segments() {
        assert_eq!(
            resolve("manager/login/"),
            Ok(RouteDecision::ManagerAction {
                segments: vec!["login".into()]
            })
        );
        assert_eq!(
            resolve("USER"),
            Ok(RouteDecision::UserAction { segments: vec![] })
        );
    }

    #[test]
    fn every_input_gets_a_decision_or_a_route_error() {
        let samples = [
            "//", "///conversations", "conversations/updates/[", "conversations/updates/[{\"id\":",
            "ünïcödé", "conversations/ünï", "manager//x//", "\u{0}", "conversations/updates/\u{0}",
            "user/../../etc/passwd", "CONVERSATIONS/UPDATES/[{\"id\":null}]",
        ];
        for path in samples {
            let _ = resolve(path);
        }
    }
}
