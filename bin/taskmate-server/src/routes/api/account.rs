//! Session check and whole-account data removal.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{delete, get};
use axum::{Extension, Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::entities::SessionStore;
use crate::error::ServerError;
use crate::middleware::CurrentUser;
use crate::schemas::api::account::{PurgeResponse, VerifyResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(verify_session, purge_account),
    components(schemas(VerifyResponse, PurgeResponse))
)]
pub struct AccountApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/verify", get(verify_session))
        .route("/account", delete(purge_account))
}

/// Confirm the bearer token belongs to a live session.
#[utoipa::path(
    get,
    path = "/api/auth/verify",
    tag = "account",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Missing or expired session"),
    )
)]
pub async fn verify_session(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        user_id: user,
        message: "Token is valid".to_owned(),
    })
}

/// Delete every task, conversation and session the caller owns.
///
/// Sessions go first so a failure part way never leaves the token usable on
/// a half-emptied account.
#[utoipa::path(
    delete,
    path = "/api/account",
    tag = "account",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Account data removed", body = PurgeResponse),
        (status = 401, description = "Missing or expired session"),
        (status = 503, description = "Store unavailable"),
    )
)]
pub async fn purge_account(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<PurgeResponse>, ServerError> {
    let sessions_revoked = state.store.delete_user_sessions(&user).await?;
    let (tasks_deleted, conversations_deleted) = state.agent.purge_owner(&user).await?;
    info!(user_id = %user, tasks_deleted, conversations_deleted, sessions_revoked, "account purged");
    Ok(Json(PurgeResponse {
        tasks_deleted,
        conversations_deleted,
        sessions_revoked,
    }))
}

#[cfg(test)]
mod test {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::*;
    use crate::state::AppState;

    #[tokio::test]
    async fn verify_echoes_the_session_user() {
        let (app, _) = app().await;
        let resp = send(&app, request("GET", "/api/auth/verify", TOKEN, None)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["user_id"], "alice");
        assert_eq!(body["message"], "Token is valid");
    }

    #[tokio::test]
    async fn purge_removes_only_the_callers_data() {
        let (app, _) = app().await;
        for token in [TOKEN, OTHER_TOKEN] {
            send(
                &app,
                request("POST", "/api/chat", token, Some(json!({ "message": "Add feed cat" }))),
            )
            .await;
        }

        let resp = send(&app, request("DELETE", "/api/account", TOKEN, None)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["tasks_deleted"], 1);
        assert_eq!(body["conversations_deleted"], 1);
        assert_eq!(body["sessions_revoked"], 1);

        // The token is gone with the rest of the account.
        let resp = send(&app, request("GET", "/api/tasks", TOKEN, None)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = send(&app, request("GET", "/api/tasks", OTHER_TOKEN, None)).await;
        assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);
    }

    async fn break_task_table(state: &AppState) {
        sqlx::query("DROP TABLE tasks")
            .execute(state.store.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failed_purge_still_revokes_the_token() {
        let (app, state) = app().await;
        break_task_table(&state).await;

        let resp = send(&app, request("DELETE", "/api/account", TOKEN, None)).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let resp = send(&app, request("GET", "/api/auth/verify", TOKEN, None)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let resp = send(&app, request("GET", "/api/auth/verify", OTHER_TOKEN, None)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
