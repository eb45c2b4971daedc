use serde::{Deserialize, Serialize};
use taskmate_agent::Task;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::schemas::ToResponse;

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct TaskStatusQuery {
    /// `all` (default), `pending` or `completed`.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaskResponse {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl ToResponse for Task {
    type Response = TaskResponse;

    fn to_response(&self) -> TaskResponse {
        TaskResponse {
            id: self.id,
            user_id: self.owner_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            completed: self.completed,
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
        }
    }
}
