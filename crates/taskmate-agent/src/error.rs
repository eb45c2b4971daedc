use crate::types::Task;

/// Every failure the turn pipeline can run into.
///
/// The pipeline turns all of these into a reply (see
/// [`crate::formatter::format_error`]); only conversation-level failures are
/// returned to the caller of [`crate::TaskAgent::handle_turn`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    /// Bad input shape, e.g. an empty or overlong title.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A reference or id resolved to nothing in the caller's task set.
    #[error("no task matches '{0}'")]
    NotFound(String),

    /// A reference matched more than one task.
    #[error("'{reference}' matches {} tasks", candidates.len())]
    Ambiguous {
        reference: String,
        candidates: Vec<Task>,
    },

    /// The record exists but belongs to another owner.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The task store or conversation log could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The classifier could not produce an intent.
    #[error("could not classify utterance: {0}")]
    ClassifyFailed(String),

    /// The conversation does not exist or is not owned by the caller.
    #[error("conversation {0} not found")]
    ConversationNotFound(String),
}

impl AgentError {
    /// Stable machine-readable code, used in tool-call results and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::Validation(_) => "validation",
            AgentError::NotFound(_) => "not_found",
            AgentError::Ambiguous { .. } => "ambiguous",
            AgentError::Unauthorized(_) => "unauthorized",
            AgentError::StoreUnavailable(_) => "store_unavailable",
            AgentError::ClassifyFailed(_) => "classify_failed",
            AgentError::ConversationNotFound(_) => "conversation_not_found",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ambiguous_message_counts_candidates() {
        let err = AgentError::Ambiguous {
            reference: "meeting".into(),
            candidates: Vec::new(),
        };
        assert_eq!(err.to_string(), "'meeting' matches 0 tasks");
        assert_eq!(err.code(), "ambiguous");
    }
}
