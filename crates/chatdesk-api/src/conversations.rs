use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use chatdesk_crypto::token;
use chatdesk_db::Database;
use chatdesk_db::models::{ConversationRow, MessageRow};
use chatdesk_gateway::waiter::{WaitOutcome, Watch};
use chatdesk_types::api::{
    LiveConversationsResponse, SendMessageRequest, StartConversationRequest,
    StartConversationResponse, UpdateEntry, UpdatesResponse,
};
use chatdesk_types::models::{Conversation, ConversationState, Message, Role};
use chatdesk_types::time::{format_timestamp, parse_timestamp};

use crate::error::ApiError;
use crate::state::{AppState, Settings};

pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Caller facts a conversation token is bound to.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub client_address: String,
    pub client_agent: String,
}

/// Mint a token for `fingerprint` and record a new, unclaimed conversation
/// under it. Every call creates a fresh conversation.
pub fn start_conversation(db: &Database, username: &str, fingerprint: &str) -> Result<String, ApiError> {
    if !token::is_long_enough(fingerprint) {
        return Err(ApiError::BadRequest("signature is too short".into()));
    }

    let id = token::generate(fingerprint);
    db.insert_conversation(&id, None, username, &format_timestamp(Utc::now()))?;
    Ok(id)
}

/// POST /conversations
pub async fn new_conversation(
    state: &AppState,
    ctx: &RequestContext,
    req: StartConversationRequest,
) -> Result<Response, ApiError> {
    let username = req.username.unwrap_or_default();
    let fingerprint = token::fingerprint(&username, &ctx.client_address, &ctx.client_agent);

    let db = state.db.clone();
    let id = tokio::task::spawn_blocking(move || start_conversation(&db, &username, &fingerprint))
        .await??;

    info!("Conversation {} started from {}", short_id(&id), ctx.client_address);

    Ok((StatusCode::CREATED, Json(StartConversationResponse { id })).into_response())
}

/// POST /conversations/messages
pub async fn send_message(
    state: &AppState,
    ctx: &RequestContext,
    req: SendMessageRequest,
) -> Result<Response, ApiError> {
    let user = match req.user.as_deref() {
        None => Role::Client,
        Some(code) => Role::from_code(code)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown user role '{}'", code)))?,
    };

    let length = req.message.chars().count();
    if length == 0 || length > MAX_MESSAGE_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "message must be between 1 and {} characters",
            MAX_MESSAGE_LENGTH
        )));
    }

    let now = Utc::now();
    let db = state.db.clone();
    let settings = state.settings.clone();
    let caller = ctx.clone();
    let cid = req.conversation_id.clone();
    let text = req.message.clone();

    let message_id = tokio::task::spawn_blocking(move || {
        let conversation = db.get_conversation(&cid)?.ok_or(ApiError::NotFound)?;
        check_capability(&settings, &conversation, &caller)?;

        db.append_message(&cid, user.as_char(), &text, &format_timestamp(now))?
            .ok_or(ApiError::NotFound)
    })
    .await??;

    // Wake long-polls only after the append has committed.
    state.dispatcher.publish(&req.conversation_id);
    debug!("Message {} appended to {}", message_id, short_id(&req.conversation_id));

    Ok((
        StatusCode::CREATED,
        Json(Message {
            id: message_id,
            user,
            message: req.message,
            conversation_id: req.conversation_id,
            time_stamp: now,
        }),
    )
        .into_response())
}

/// GET|POST /conversations/updates/<json>
///
/// Blocks until one of the listed conversations changes or the wait bound
/// runs out, then returns the current state of every listed conversation.
pub async fn check_updates(
    state: &AppState,
    ctx: &RequestContext,
    updates: Vec<UpdateEntry>,
) -> Result<Response, ApiError> {
    let targets: Vec<(String, i64)> = updates
        .iter()
        .map(|u| (u.id.to_string(), u.last_message_id.unwrap_or(0)))
        .collect();

    // Reject unknown or foreign conversations before taking a waiter slot.
    let db = state.db.clone();
    let settings = state.settings.clone();
    let caller = ctx.clone();
    let ids: Vec<String> = targets.iter().map(|(id, _)| id.clone()).collect();
    tokio::task::spawn_blocking(move || {
        for id in &ids {
            let conversation = db.get_conversation(id)?.ok_or(ApiError::NotFound)?;
            check_capability(&settings, &conversation, &caller)?;
        }
        Ok::<_, ApiError>(())
    })
    .await??;

    let watches: Vec<Watch> = updates
        .iter()
        .map(|u| Watch {
            conversation_id: u.id.to_string(),
            last_known_edit: u.last_edit,
        })
        .collect();

    let result = state.waiter.wait_for_any(&watches).await?;
    debug!(
        "Updates wait for {} conversation(s) finished: {:?} after {} checks",
        watches.len(),
        result.outcome,
        result.checks
    );

    let db = state.db.clone();
    let conversations = tokio::task::spawn_blocking(move || {
        targets
            .iter()
            .map(|(id, after)| load_state(&db, id, *after))
            .collect::<Result<Vec<_>, ApiError>>()
    })
    .await??;

    Ok(Json(UpdatesResponse {
        updated: result.outcome == WaitOutcome::Updated,
        conversations,
    })
    .into_response())
}

/// GET /conversations/live
pub async fn live_conversations(state: &AppState) -> Result<Response, ApiError> {
    let window = chrono::Duration::from_std(state.settings.live_window)
        .map_err(|e| anyhow::anyhow!("live window out of range: {}", e))?;
    let since = format_timestamp(Utc::now() - window);

    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.live_conversations(&since)).await??;

    let conversations = rows.into_iter().map(conversation_from_row).collect();
    Ok(Json(LiveConversationsResponse { conversations }).into_response())
}

fn check_capability(
    settings: &Settings,
    conversation: &ConversationRow,
    ctx: &RequestContext,
) -> Result<(), ApiError> {
    if !settings.require_fingerprint {
        return Ok(());
    }

    let fingerprint =
        token::fingerprint(&conversation.username, &ctx.client_address, &ctx.client_agent);
    if token::verify(&conversation.id, &fingerprint) {
        Ok(())
    } else {
        warn!(
            "Fingerprint mismatch on conversation {} from {}",
            short_id(&conversation.id),
            ctx.client_address
        );
        Err(ApiError::Forbidden)
    }
}

fn load_state(db: &Arc<Database>, id: &str, after_message_id: i64) -> Result<ConversationState, ApiError> {
    let row = db.get_conversation(id)?.ok_or(ApiError::NotFound)?;
    let messages = db.messages_since(id, after_message_id)?;
    let message_count = db.count_messages(id)?;

    let conversation = conversation_from_row(row);
    Ok(ConversationState {
        id: conversation.id,
        manager_id: conversation.manager_id,
        username: conversation.username,
        last_edit: conversation.last_edit,
        message_count,
        messages_since: messages.into_iter().map(message_from_row).collect(),
    })
}

fn conversation_from_row(row: ConversationRow) -> Conversation {
    Conversation {
        last_edit: timestamp_or_default(&row.last_edit, &row.id),
        id: row.id,
        manager_id: row.manager_id,
        username: row.username,
    }
}

fn message_from_row(row: MessageRow) -> Message {
    let user = Role::from_code(&row.user).unwrap_or_else(|| {
        warn!("Corrupt user '{}' on message {}", row.user, row.id);
        Role::Client
    });

    Message {
        time_stamp: timestamp_or_default(&row.time_stamp, &row.conversation_id),
        id: row.id,
        user,
        message: row.message,
        conversation_id: row.conversation_id,
    }
}

fn timestamp_or_default(raw: &str, owner: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Corrupt timestamp '{}' on {}", raw, short_id(owner));
        DateTime::default()
    })
}

/// Enough of a token to correlate log lines without leaking the capability.
fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
