use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use tracing::debug;

use crate::entities::SessionStore;
use crate::error::ServerError;
use crate::state::AppState;

/// The user id behind the request's bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Reject requests without a live session; attach [`CurrentUser`] otherwise.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let token = bearer_token(&req)
        .ok_or_else(|| ServerError::Unauthorized("missing bearer token".into()))?;
    let user_id = state
        .store
        .session_user(token, Utc::now())
        .await?
        .ok_or_else(|| ServerError::Unauthorized("invalid or expired session".into()))?;

    debug!(user_id = %user_id, "session verified");
    req.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(req).await)
}
