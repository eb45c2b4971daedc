//! Storage contracts the interpreter depends on.
//!
//! [`TaskStore`] persists tasks and [`ConversationLog`] persists chat threads.
//! Both are object-safe so the agent can hold them as `Arc<dyn _>`; the server
//! implements them on SQLite and [`crate::memory::MemoryStore`] implements
//! them in memory for tests.
//!
//! Every task operation takes the caller's `owner` and must never read or
//! touch another owner's rows. A task that exists under a different owner is
//! reported as [`AgentError::NotFound`] so ids do not leak across users.

use async_trait::async_trait;

use crate::error::AgentError;
use crate::types::{Conversation, Message, NewTask, StatusFilter, Task, TaskId, TaskPatch};

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new task and return it with its assigned id.
    async fn create(&self, owner: &str, task: NewTask) -> Result<Task, AgentError>;

    /// The owner's tasks matching `filter`, newest first.
    async fn list(&self, owner: &str, filter: StatusFilter) -> Result<Vec<Task>, AgentError>;

    async fn get(&self, owner: &str, id: TaskId) -> Result<Task, AgentError>;

    /// Apply a partial update and return the updated row.
    async fn update(&self, owner: &str, id: TaskId, patch: TaskPatch) -> Result<Task, AgentError>;

    /// Delete and return the removed row.
    async fn delete(&self, owner: &str, id: TaskId) -> Result<Task, AgentError>;

    /// Flip `completed` and return the updated row.
    async fn toggle(&self, owner: &str, id: TaskId) -> Result<Task, AgentError>;

    /// Remove every task owned by `owner`. Returns the number removed.
    async fn purge_owner(&self, owner: &str) -> Result<u64, AgentError>;
}

#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn create_conversation(&self, conversation: Conversation) -> Result<(), AgentError>;

    /// `None` when the conversation is missing or belongs to someone else.
    async fn get_conversation(
        &self,
        owner: &str,
        id: &str,
    ) -> Result<Option<Conversation>, AgentError>;

    /// The owner's conversations, most recently active first.
    async fn list_conversations(&self, owner: &str) -> Result<Vec<Conversation>, AgentError>;

    /// Delete a conversation and its messages. Returns `false` if nothing matched.
    async fn delete_conversation(&self, owner: &str, id: &str) -> Result<bool, AgentError>;

    /// Bump `updated_at` to now.
    async fn touch_conversation(&self, id: &str) -> Result<(), AgentError>;

    async fn append(&self, message: Message) -> Result<(), AgentError>;

    /// The last `limit` messages of a conversation, oldest first.
    async fn recent(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>, AgentError>;

    /// Every message of a conversation, oldest first.
    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, AgentError>;

    async fn count_messages(&self, conversation_id: &str) -> Result<u64, AgentError>;

    /// Remove every conversation owned by `owner`. Returns the number removed.
    async fn purge_conversations(&self, owner: &str) -> Result<u64, AgentError>;
}
