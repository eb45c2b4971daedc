//! Natural-language command interpreter for a personal to-do list.
//!
//! An utterance goes through [`TaskAgent::handle_turn`]: it is classified into
//! an [`Intent`], any task reference is resolved against the owner's tasks,
//! one store operation runs, and a deterministic reply is produced. Storage is
//! reached through [`TaskStore`] and [`ConversationLog`]; [`MemoryStore`]
//! implements both in-process.

pub mod agent;
pub mod classifier;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod formatter;
pub mod intent;
pub mod memory;
pub mod oracle;
pub mod resolver;
pub mod store;
pub mod types;


pub use agent::{TaskAgent, TurnReply, TurnState};
pub use classifier::{Classifier, FallbackClassifier, RuleClassifier};
pub use context::{DEFAULT_HISTORY_WINDOW, TurnContext, TurnMeta};
pub use error::AgentError;
pub use intent::{Intent, IntentKind, PendingEdit};
pub use memory::MemoryStore;
pub use oracle::{CompletionOracle, OracleClassifier, PromptMessage};
pub use store::{ConversationLog, TaskStore};
pub use types::{
    Conversation, Message, NewTask, Role, StatusFilter, Task, TaskId, TaskPatch, ToolCall,
};
