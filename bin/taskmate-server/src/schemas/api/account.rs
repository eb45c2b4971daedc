use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub user_id: String,
    pub message: String,
}

/// What `DELETE /api/account` removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PurgeResponse {
    pub tasks_deleted: u64,
    pub conversations_deleted: u64,
    pub sessions_revoked: u64,
}
