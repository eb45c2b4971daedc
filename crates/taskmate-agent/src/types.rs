//! Records shared between the interpreter and its stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::context::TurnMeta;
use crate::error::AgentError;

/// Store-assigned task identifier, unique per store.
pub type TaskId = i64;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// A single to-do item owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status filter accepted by list operations.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl StatusFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => !task.completed,
            StatusFilter::Completed => task.completed,
        }
    }
}

/// Validated input for creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
}

impl NewTask {
    pub fn new(title: &str, description: Option<&str>) -> Result<Self, AgentError> {
        let title = validate_title(title)?;
        let description = validate_description(description.unwrap_or_default())?;
        Ok(Self { title, description })
    }
}

/// Partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn completed(value: bool) -> Self {
        Self {
            completed: Some(value),
            ..Self::default()
        }
    }

    /// Trims and checks the provided fields against the task limits.
    pub fn validated(self) -> Result<Self, AgentError> {
        Ok(Self {
            title: self.title.as_deref().map(validate_title).transpose()?,
            description: self
                .description
                .as_deref()
                .map(validate_description)
                .transpose()?,
            completed: self.completed,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.completed.is_none()
    }

    /// Names of the fields this patch sets, in display order.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.completed.is_some() {
            fields.push("status");
        }
        fields
    }

    /// Applies the patch in place; stores without native partial updates use this.
    pub fn apply_to(&self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if !self.is_empty() {
            task.updated_at = now;
        }
    }
}

pub fn validate_title(raw: &str) -> Result<String, AgentError> {
    let title = raw.trim();
    let len = title.chars().count();
    if len == 0 {
        return Err(AgentError::Validation("title must not be empty".into()));
    }
    if len > MAX_TITLE_CHARS {
        return Err(AgentError::Validation(format!(
            "title is {len} characters; maximum is {MAX_TITLE_CHARS}"
        )));
    }
    Ok(title.to_owned())
}

pub fn validate_description(raw: &str) -> Result<String, AgentError> {
    let description = raw.trim();
    let len = description.chars().count();
    if len > MAX_DESCRIPTION_CHARS {
        return Err(AgentError::Validation(format!(
            "description is {len} characters; maximum is {MAX_DESCRIPTION_CHARS}"
        )));
    }
    Ok(description.to_owned())
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A chat thread. Never shared across owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub owner_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub const TITLE_CHARS: usize = 50;

    /// A fresh conversation titled after its first utterance.
    pub fn start(owner_id: &str, first_utterance: &str) -> Self {
        let now = Utc::now();
        let trimmed = first_utterance.trim();
        let mut title: String = trimmed.chars().take(Self::TITLE_CHARS).collect();
        if trimmed.chars().count() > Self::TITLE_CHARS {
            title.push_str("...");
        }
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_owned(),
            title: (!title.is_empty()).then_some(title),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One store operation performed while answering a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub operation: String,
    pub arguments: serde_json::Value,
    pub result: serde_json::Value,
}

/// An append-only entry in a conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<TurnMeta>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(conversation_id: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_owned(),
            role: Role::User,
            content: content.to_owned(),
            tool_calls: Vec::new(),
            meta: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(
        conversation_id: &str,
        content: String,
        tool_calls: Vec<ToolCall>,
        meta: TurnMeta,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_owned(),
            role: Role::Assistant,
            content,
            tool_calls,
            meta: Some(meta),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn title_is_trimmed_and_bounded() {
        assert_eq!(validate_title("  buy milk ").unwrap(), "buy milk");
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_CHARS)).is_ok());
        assert!(validate_title(&"x".repeat(MAX_TITLE_CHARS + 1)).is_err());
    }

    #[test]
    fn description_limit_counts_chars_not_bytes() {
        let accented = "é".repeat(MAX_DESCRIPTION_CHARS);
        assert!(validate_description(&accented).is_ok());
        assert!(validate_description(&format!("{accented}é")).is_err());
    }

    #[test]
    fn status_filter_parses_case_insensitively() {
        assert_eq!(StatusFilter::from_str("Pending").unwrap(), StatusFilter::Pending);
        assert_eq!(StatusFilter::Completed.to_string(), "completed");
        assert!(StatusFilter::from_str("archived").is_err());
    }

    #[test]
    fn patch_reports_changed_fields() {
        let patch = TaskPatch {
            title: Some("new".into()),
            completed: Some(true),
            ..TaskPatch::default()
        };
        assert_eq!(patch.changed_fields(), vec!["title", "status"]);
        assert!(TaskPatch::default().is_empty());
    }

    #[test]
    fn conversation_title_is_truncated() {
        let long = "a".repeat(80);
        let conversation = Conversation::start("u1", &long);
        let title = conversation.title.unwrap();
        assert_eq!(title.chars().count(), Conversation::TITLE_CHARS + 3);
        assert!(title.ends_with("..."));

        let short = Conversation::start("u1", "add milk");
        assert_eq!(short.title.as_deref(), Some("add milk"));
    }
}
