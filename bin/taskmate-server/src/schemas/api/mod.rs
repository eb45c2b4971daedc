pub mod account;
pub mod chat;
pub mod conversation;
pub mod task;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Plain confirmation body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
