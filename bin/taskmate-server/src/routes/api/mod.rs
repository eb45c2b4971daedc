pub mod account;
pub mod chat;
pub mod conversations;
pub mod tasks;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use utoipa::OpenApi;

use crate::middleware::auth;
use crate::state::AppState;

/// Routes nested under `/api`; every one of them needs a live session.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(tasks::router())
        .merge(chat::router())
        .merge(conversations::router())
        .merge(account::router())
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_session,
        ))
}

#[derive(OpenApi)]
#[openapi()]
pub struct Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = Api::openapi();
    spec.merge(tasks::TasksApi::openapi());
    spec.merge(chat::ChatApi::openapi());
    spec.merge(conversations::ConversationsApi::openapi());
    spec.merge(account::AccountApi::openapi());
    spec
}
