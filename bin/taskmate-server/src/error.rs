//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! Database and internal errors are logged with full detail but only a
//! generic message is returned, so SQL and file paths never reach clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use taskmate_agent::AgentError;
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the taskmate-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the interpreter or its stores.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Propagated from the SQLite store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing, invalid or expired bearer token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for ServerError {
    fn from(e: validator::ValidationErrors) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}

impl ServerError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ServerError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Agent(e) => match e {
                AgentError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
                AgentError::NotFound(_) => (StatusCode::NOT_FOUND, "task not found".to_owned()),
                AgentError::ConversationNotFound(_) => {
                    (StatusCode::NOT_FOUND, "conversation not found".to_owned())
                }
                AgentError::Ambiguous { .. } => (StatusCode::CONFLICT, e.to_string()),
                AgentError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized".to_owned()),
                AgentError::ClassifyFailed(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "could not understand the message".to_owned())
                }
                AgentError::StoreUnavailable(detail) => {
                    error!(error = %detail, "store unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "storage is temporarily unavailable".to_owned(),
                    )
                }
            },
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = self.status_and_message();
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn agent_errors_map_to_http_statuses() {
        let status = |e: AgentError| ServerError::from(e).status_and_message().0;
        assert_eq!(status(AgentError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(AgentError::NotFound("task 1".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status(AgentError::ConversationNotFound("c".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(AgentError::Ambiguous {
                reference: "x".into(),
                candidates: Vec::new()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status(AgentError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(AgentError::StoreUnavailable("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn database_detail_is_not_exposed() {
        let (status, message) = ServerError::Database(sqlx::Error::RowNotFound).status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "internal server error");
    }
}
