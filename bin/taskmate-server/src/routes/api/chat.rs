use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Extension, Json, Router};
use utoipa::OpenApi;
use validator::Validate;

use crate::error::ServerError;
use crate::middleware::CurrentUser;
use crate::schemas::ToResponse;
use crate::schemas::api::chat::{ChatRequest, ChatResponse, ToolCallResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(chat),
    components(schemas(ChatRequest, ChatResponse, ToolCallResponse))
)]
pub struct ChatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

/// Send one utterance to the task interpreter.
///
/// Operational failures (unknown task, ambiguous reference, store outage) come
/// back as a 200 with an explanatory reply; only a bad request body or a
/// foreign conversation id is an HTTP error.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Turn handled", body = ChatResponse),
        (status = 400, description = "Empty or overlong message"),
        (status = 401, description = "Missing or expired session"),
        (status = 404, description = "Conversation not found"),
        (status = 503, description = "Conversation log unavailable"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ServerError> {
    req.validate()?;
    let reply = state
        .agent
        .handle_turn(&user, req.conversation_id.as_deref(), &req.message)
        .await?;
    Ok(Json(reply.to_response()))
}

#[cfg(test)]
mod test {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::*;

    #[tokio::test]
    async fn chat_creates_a_task_and_continues_the_conversation() {
        let (app, _) = app().await;
        let resp = send(
            &app,
            request("POST", "/api/chat", TOKEN, Some(json!({ "message": "Add buy groceries" }))),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["response"], "Added 'buy groceries' to your list.");
        assert_eq!(body["intent"], "create");
        assert_eq!(body["tool_calls"][0]["operation"], "add_task");
        let conversation_id = body["conversation_id"].as_str().unwrap().to_owned();

        let resp = send(
            &app,
            request(
                "POST",
                "/api/chat",
                TOKEN,
                Some(json!({ "message": "show my tasks", "conversation_id": conversation_id })),
            ),
        )
        .await;
        let body = json_body(resp).await;
        assert_eq!(body["conversation_id"], conversation_id.as_str());
        assert!(body["response"].as_str().unwrap().contains("buy groceries"));

        let tasks = json_body(send(&app, request("GET", "/api/tasks", TOKEN, None)).await).await;
        assert_eq!(tasks.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (app, _) = app().await;
        let resp = send(
            &app,
            request("POST", "/api/chat", TOKEN, Some(json!({ "message": "" }))),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_task_is_a_reply_not_an_error() {
        let (app, _) = app().await;
        let resp = send(
            &app,
            request("POST", "/api/chat", TOKEN, Some(json!({ "message": "Delete task 42" }))),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert!(body["response"].as_str().unwrap().contains("couldn't find"));
    }

    #[tokio::test]
    async fn foreign_conversation_is_not_found() {
        let (app, _) = app().await;
        let body = json_body(
            send(
                &app,
                request("POST", "/api/chat", TOKEN, Some(json!({ "message": "hello" }))),
            )
            .await,
        )
        .await;
        let conversation_id = body["conversation_id"].as_str().unwrap();

        let resp = send(
            &app,
            request(
                "POST",
                "/api/chat",
                OTHER_TOKEN,
                Some(json!({ "message": "show my tasks", "conversation_id": conversation_id })),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
