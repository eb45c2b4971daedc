//! Direct task CRUD, scoped to the session's user.
//!
//! These bypass the interpreter entirely; the chat endpoint reaches the same
//! rows through [`TaskStore`].

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Extension, Json, Router};
use taskmate_agent::{NewTask, StatusFilter, TaskId, TaskPatch, TaskStore};
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use crate::error::ServerError;
use crate::middleware::CurrentUser;
use crate::schemas::ToResponse;
use crate::schemas::api::MessageResponse;
use crate::schemas::api::task::{CreateTaskRequest, TaskResponse, TaskStatusQuery, UpdateTaskRequest};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_tasks, create_task, get_task, update_task, delete_task, toggle_task),
    components(schemas(TaskResponse, CreateTaskRequest, UpdateTaskRequest, MessageResponse))
)]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/{id}/complete", patch(toggle_task))
}

#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "tasks",
    params(TaskStatusQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Tasks listed, newest first", body = [TaskResponse]),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Missing or expired session"),
    )
)]
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(q): Query<TaskStatusQuery>,
) -> Result<Json<Vec<TaskResponse>>, ServerError> {
    let filter = match q.status.as_deref() {
        None => StatusFilter::All,
        Some(raw) => StatusFilter::from_str(raw)
            .map_err(|_| ServerError::BadRequest(format!("unknown status filter '{raw}'")))?,
    };
    let tasks = state.store.list(&user, filter).await?;
    Ok(Json(tasks.iter().map(ToResponse::to_response).collect()))
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = "tasks",
    request_body = CreateTaskRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 400, description = "Invalid title or description"),
        (status = 401, description = "Missing or expired session"),
    )
)]
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ServerError> {
    req.validate()?;
    let new_task = NewTask::new(&req.title, req.description.as_deref())?;
    let task = state.store.create(&user, new_task).await?;
    info!(task_id = task.id, user_id = %user, "task created");
    Ok((StatusCode::CREATED, Json(task.to_response())))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Task retrieved", body = TaskResponse),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<TaskId>,
) -> Result<Json<TaskResponse>, ServerError> {
    let task = state.store.get(&user, id).await?;
    Ok(Json(task.to_response()))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    request_body = UpdateTaskRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Task updated", body = TaskResponse),
        (status = 400, description = "Invalid title or description"),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<TaskId>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, ServerError> {
    req.validate()?;
    let changes = TaskPatch {
        title: req.title,
        description: req.description,
        completed: None,
    };
    let task = state.store.update(&user, id, changes).await?;
    Ok(Json(task.to_response()))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Task deleted", body = MessageResponse),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<TaskId>,
) -> Result<Json<MessageResponse>, ServerError> {
    state.store.delete(&user, id).await?;
    info!(task_id = id, user_id = %user, "task deleted");
    Ok(Json(MessageResponse::new("Task deleted successfully")))
}

/// Flip a task between pending and completed.
#[utoipa::path(
    patch,
    path = "/api/tasks/{id}/complete",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Completion toggled", body = TaskResponse),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn toggle_task(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<TaskId>,
) -> Result<Json<TaskResponse>, ServerError> {
    let task = state.store.toggle(&user, id).await?;
    Ok(Json(task.to_response()))
}

#[cfg(test)]
mod test {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::*;

    #[tokio::test]
    async fn create_returns_201_and_lists_newest_first() {
        let (app, _) = app().await;
        for title in ["first", "second"] {
            let resp = send(
                &app,
                request("POST", "/api/tasks", TOKEN, Some(json!({ "title": title }))),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::CREATED);
        }

        let resp = send(&app, request("GET", "/api/tasks", TOKEN, None)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        let titles: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["title"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(titles, ["second", "first"]);
        assert_eq!(body[0]["user_id"], "alice");
        assert_eq!(body[0]["completed"], false);
    }

    #[tokio::test]
    async fn blank_or_long_titles_are_rejected() {
        let (app, _) = app().await;
        let resp = send(
            &app,
            request("POST", "/api/tasks", TOKEN, Some(json!({ "title": "" }))),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(
            &app,
            request("POST", "/api/tasks", TOKEN, Some(json!({ "title": "   " }))),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let long = "x".repeat(201);
        let resp = send(
            &app,
            request("POST", "/api/tasks", TOKEN, Some(json!({ "title": long }))),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_toggle_and_delete() {
        let (app, _) = app().await;
        let created = json_body(
            send(
                &app,
                request("POST", "/api/tasks", TOKEN, Some(json!({ "title": "draft" }))),
            )
            .await,
        )
        .await;
        let id = created["id"].as_i64().unwrap();

        let resp = send(
            &app,
            request(
                "PUT",
                &format!("/api/tasks/{id}"),
                TOKEN,
                Some(json!({ "title": "final", "description": "ship it" })),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let updated = json_body(resp).await;
        assert_eq!(updated["title"], "final");
        assert_eq!(updated["description"], "ship it");

        let toggled = json_body(
            send(&app, request("PATCH", &format!("/api/tasks/{id}/complete"), TOKEN, None)).await,
        )
        .await;
        assert_eq!(toggled["completed"], true);

        let resp = send(&app, request("GET", "/api/tasks?status=pending", TOKEN, None)).await;
        assert_eq!(json_body(resp).await.as_array().unwrap().len(), 0);

        let resp = send(&app, request("DELETE", &format!("/api/tasks/{id}"), TOKEN, None)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["message"], "Task deleted successfully");

        let resp = send(&app, request("GET", &format!("/api/tasks/{id}"), TOKEN, None)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_users_tasks_are_invisible() {
        let (app, _) = app().await;
        let created = json_body(
            send(
                &app,
                request("POST", "/api/tasks", TOKEN, Some(json!({ "title": "private" }))),
            )
            .await,
        )
        .await;
        let id = created["id"].as_i64().unwrap();

        let resp = send(&app, request("GET", &format!("/api/tasks/{id}"), OTHER_TOKEN, None)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = send(&app, request("DELETE", &format!("/api/tasks/{id}"), OTHER_TOKEN, None)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(&app, request("GET", "/api/tasks", OTHER_TOKEN, None)).await;
        assert!(json_body(resp).await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_status_filter_is_a_bad_request() {
        let (app, _) = app().await;
        let resp = send(&app, request("GET", "/api/tasks?status=someday", TOKEN, None)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
