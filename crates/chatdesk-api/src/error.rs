use axum::{
    Json,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use chatdesk_gateway::waiter::WaitError;
use chatdesk_types::api::ErrorBody;

use crate::router::RouteError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("conversation not found")]
    NotFound,
    #[error("request does not match the conversation's fingerprint")]
    Forbidden,
    #[error("method {0} not allowed on this path")]
    MethodNotAllowed(Method),
    #[error("too many update requests in flight, retry shortly")]
    Busy,
    #[error("{0} are not available on this server")]
    NotImplemented(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Route(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Busy => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable tag for the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Route(RouteError::InvalidBasePath) => "invalid_base_path",
            Self::Route(RouteError::InvalidConversationPath) => "invalid_conversation_path",
            Self::Route(RouteError::InvalidUpdates(_)) => "invalid_updates",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::MethodNotAllowed(_) => "method_not_allowed",
            Self::Busy => "busy",
            Self::NotImplemented(_) => "not_implemented",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<WaitError> for ApiError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Busy => Self::Busy,
            WaitError::NotFound(_) => Self::NotFound,
            WaitError::Storage(e) => Self::Internal(e),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        error!("spawn_blocking join error: {}", err);
        Self::Internal(anyhow::anyhow!("spawn_blocking join error: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.kind().to_string(),
            message,
        };
        (self.status(), Json(body)).into_response()
    }
}
