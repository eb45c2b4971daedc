use serde::{Deserialize, Serialize};
use taskmate_agent::{Conversation, Message};
use utoipa::ToSchema;

use crate::schemas::ToResponse;
use crate::schemas::api::chat::ToolCallResponse;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationResponse {
    pub id: String,
    pub title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationMessageResponse {
    pub id: String,
    pub role: String,
    pub content: String,
    pub tool_calls: Vec<ToolCallResponse>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationDetailResponse {
    pub id: String,
    pub title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub messages: Vec<ConversationMessageResponse>,
}

impl ToResponse for Message {
    type Response = ConversationMessageResponse;

    fn to_response(&self) -> ConversationMessageResponse {
        ConversationMessageResponse {
            id: self.id.clone(),
            role: self.role.to_string(),
            content: self.content.clone(),
            tool_calls: self.tool_calls.iter().map(ToResponse::to_response).collect(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

pub fn summary(conversation: &Conversation, message_count: u64) -> ConversationResponse {
    ConversationResponse {
        id: conversation.id.clone(),
        title: conversation.title.clone(),
        created_at: conversation.created_at.to_rfc3339(),
        updated_at: conversation.updated_at.to_rfc3339(),
        message_count,
    }
}

pub fn detail(conversation: &Conversation, messages: &[Message]) -> ConversationDetailResponse {
    ConversationDetailResponse {
        id: conversation.id.clone(),
        title: conversation.title.clone(),
        created_at: conversation.created_at.to_rfc3339(),
        updated_at: conversation.updated_at.to_rfc3339(),
        messages: messages.iter().map(ToResponse::to_response).collect(),
    }
}
