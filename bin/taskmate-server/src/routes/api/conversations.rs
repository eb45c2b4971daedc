//! Read and delete chat history.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use taskmate_agent::ConversationLog;
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::middleware::CurrentUser;
use crate::schemas::api::MessageResponse;
use crate::schemas::api::conversation::{
    ConversationDetailResponse, ConversationMessageResponse, ConversationResponse, detail, summary,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_conversations, get_conversation, delete_conversation),
    components(schemas(
        ConversationResponse,
        ConversationDetailResponse,
        ConversationMessageResponse
    ))
)]
pub struct ConversationsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route(
            "/conversations/{id}",
            get(get_conversation).delete(delete_conversation),
        )
}

#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "conversations",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Conversations, most recently active first", body = [ConversationResponse]),
        (status = 401, description = "Missing or expired session"),
    )
)]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<ConversationResponse>>, ServerError> {
    let conversations = state.store.list_conversations(&user).await?;
    let mut out = Vec::with_capacity(conversations.len());
    for conversation in &conversations {
        let count = state.store.count_messages(&conversation.id).await?;
        out.push(summary(conversation, count));
    }
    Ok(Json(out))
}

#[utoipa::path(
    get,
    path = "/api/conversations/{id}",
    tag = "conversations",
    params(("id" = String, Path, description = "Conversation id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Conversation with its messages", body = ConversationDetailResponse),
        (status = 404, description = "Conversation not found"),
    )
)]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ConversationDetailResponse>, ServerError> {
    let conversation = state
        .store
        .get_conversation(&user, &id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("conversation {id} not found")))?;
    let messages = state.store.messages(&conversation.id).await?;
    Ok(Json(detail(&conversation, &messages)))
}

#[utoipa::path(
    delete,
    path = "/api/conversations/{id}",
    tag = "conversations",
    params(("id" = String, Path, description = "Conversation id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Conversation deleted", body = MessageResponse),
        (status = 404, description = "Conversation not found"),
    )
)]
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ServerError> {
    if !state.store.delete_conversation(&user, &id).await? {
        return Err(ServerError::NotFound(format!("conversation {id} not found")));
    }
    info!(conversation_id = %id, user_id = %user, "conversation deleted");
    Ok(Json(MessageResponse::new("Conversation deleted successfully")))
}
