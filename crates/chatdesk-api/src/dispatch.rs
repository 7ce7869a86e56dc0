use std::net::SocketAddr;

use axum::{
    Router,
    extract::{ConnectInfo, Path, Request, State, rejection::PathRejection},
    http::{Method, header},
    response::Response,
    routing::any,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use chatdesk_types::api::{SendMessageRequest, StartConversationRequest};

use crate::conversations::{self, RequestContext};
use crate::error::ApiError;
use crate::router::{RouteDecision, RouteError, resolve};
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Every request goes through the path router; there are no per-path
/// axum routes. Requires `ConnectInfo<SocketAddr>` for the client address.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/{*path}", any(dispatch_path))
        .fallback(dispatch_root)
        .with_state(state)
}

async fn dispatch_path(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    req: Request,
) -> Result<Response, ApiError> {
    // Paths that do not percent-decode to UTF-8 match no base segment.
    let Path(path) = path.map_err(|e| {
        debug!("Undecodable path '{}': {}", req.uri().path(), e);
        RouteError::InvalidBasePath
    })?;
    dispatch(&state, &path, req).await
}

async fn dispatch_root(State(state): State<AppState>, req: Request) -> Result<Response, ApiError> {
    dispatch(&state, "", req).await
}

async fn dispatch(state: &AppState, path: &str, req: Request) -> Result<Response, ApiError> {
    let decision = resolve(path).inspect_err(|e| debug!("Rejected path '{}': {}", path, e))?;
    let ctx = request_context(&req);
    let method = req.method().clone();

    match decision {
        RouteDecision::NewConversation => {
            allow(&method, &[Method::POST])?;
            let body = read_json::<StartConversationRequest>(req).await?.unwrap_or_default();
            conversations::new_conversation(state, &ctx, body).await
        }
        RouteDecision::SendMessage => {
            allow(&method, &[Method::POST])?;
            let body = read_json::<SendMessageRequest>(req)
                .await?
                .ok_or_else(|| ApiError::BadRequest("missing message body".into()))?;
            conversations::send_message(state, &ctx, body).await
        }
        RouteDecision::CheckUpdates { updates } => {
            allow(&method, &[Method::GET, Method::POST])?;
            conversations::check_updates(state, &ctx, updates).await
        }
        RouteDecision::LiveConversations => {
            allow(&method, &[Method::GET])?;
            conversations::live_conversations(state).await
        }
        RouteDecision::ManagerAction { .. } => Err(ApiError::NotImplemented("manager actions")),
        RouteDecision::UserAction { .. } => Err(ApiError::NotImplemented("user actions")),
    }
}

fn allow(method: &Method, allowed: &[Method]) -> Result<(), ApiError> {
    if allowed.contains(method) {
        Ok(())
    } else {
        Err(ApiError::MethodNotAllowed(method.clone()))
    }
}

fn request_context(req: &Request) -> RequestContext {
    let client_address = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    let client_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    RequestContext {
        client_address,
        client_agent,
    }
}

/// An empty body is `None`, so clients may post nothing at all.
async fn read_json<T: DeserializeOwned>(req: Request) -> Result<Option<T>, ApiError> {
    let bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::BadRequest(format!("unreadable body: {}", e)))?;

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))
}
