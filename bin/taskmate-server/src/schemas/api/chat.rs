use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskmate_agent::{ToolCall, TurnReply};
use utoipa::ToSchema;
use validator::Validate;

use crate::schemas::ToResponse;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ChatRequest {
    /// What the user typed.
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    /// Continue this conversation; a new one is started when absent.
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolCallResponse {
    pub operation: String,
    #[schema(value_type = Object)]
    pub arguments: Value,
    #[schema(value_type = Object)]
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
    pub message_id: String,
    /// Classified intent, e.g. `create` or `clarify`.
    pub intent: String,
    pub tool_calls: Vec<ToolCallResponse>,
}

impl ToResponse for ToolCall {
    type Response = ToolCallResponse;

    fn to_response(&self) -> ToolCallResponse {
        ToolCallResponse {
            operation: self.operation.clone(),
            arguments: self.arguments.clone(),
            result: self.result.clone(),
        }
    }
}

impl ToResponse for TurnReply {
    type Response = ChatResponse;

    fn to_response(&self) -> ChatResponse {
        ChatResponse {
            response: self.reply.clone(),
            conversation_id: self.conversation_id.clone(),
            message_id: self.message_id.clone(),
            intent: self.intent.to_string(),
            tool_calls: self.tool_calls.iter().map(ToResponse::to_response).collect(),
        }
    }
}
