//! Executes exactly one owner-scoped store operation per turn.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::AgentError;
use crate::store::TaskStore;
use crate::types::{NewTask, StatusFilter, Task, TaskId, TaskPatch, ToolCall};

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create(NewTask),
    List(StatusFilter),
    Complete(TaskId),
    Reopen(TaskId),
    Delete(TaskId),
    Update(TaskId, TaskPatch),
}

impl Operation {
    /// Tool name recorded in the conversation log.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create(_) => "add_task",
            Operation::List(_) => "list_tasks",
            Operation::Complete(_) => "complete_task",
            Operation::Reopen(_) => "reopen_task",
            Operation::Delete(_) => "delete_task",
            Operation::Update(..) => "update_task",
        }
    }

    pub fn arguments(&self) -> Value {
        match self {
            Operation::Create(task) => json!({
                "title": task.title,
                "description": task.description,
            }),
            Operation::List(filter) => json!({ "status": filter }),
            Operation::Complete(id) | Operation::Reopen(id) | Operation::Delete(id) => {
                json!({ "task_id": id })
            }
            Operation::Update(id, patch) => {
                let mut args = json!({ "task_id": id });
                if let (Some(map), Ok(Value::Object(fields))) =
                    (args.as_object_mut(), serde_json::to_value(patch))
                {
                    map.extend(fields);
                }
                args
            }
        }
    }

    /// Tool call recorded when the operation failed.
    pub fn failed_call(&self, err: &AgentError) -> ToolCall {
        ToolCall {
            operation: self.name().to_owned(),
            arguments: self.arguments(),
            result: json!({ "status": "error", "error": err.code(), "message": err.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Created(Task),
    Listed {
        filter: StatusFilter,
        tasks: Vec<Task>,
    },
    Completed(Task),
    AlreadyCompleted(Task),
    Reopened(Task),
    AlreadyPending(Task),
    Deleted(Task),
    Updated {
        task: Task,
        changes: Vec<&'static str>,
    },
}

impl Outcome {
    /// The single task the outcome is about, if any.
    pub fn focus(&self) -> Option<TaskId> {
        match self {
            Outcome::Listed { .. } | Outcome::Deleted(_) => None,
            Outcome::Created(t)
            | Outcome::Completed(t)
            | Outcome::AlreadyCompleted(t)
            | Outcome::Reopened(t)
            | Outcome::AlreadyPending(t)
            | Outcome::Updated { task: t, .. } => Some(t.id),
        }
    }

    /// Ids shown to the user, in display order.
    pub fn listed(&self) -> Option<Vec<TaskId>> {
        match self {
            Outcome::Listed { tasks, .. } => Some(tasks.iter().map(|t| t.id).collect()),
            _ => None,
        }
    }

    fn result(&self) -> Value {
        match self {
            Outcome::Created(t) => json!({ "task_id": t.id, "status": "created", "title": t.title }),
            Outcome::Listed { filter, tasks } => json!({
                "count": tasks.len(),
                "filter_applied": filter,
                "tasks": tasks
                    .iter()
                    .map(|t| json!({
                        "id": t.id,
                        "title": t.title,
                        "description": t.description,
                        "completed": t.completed,
                        "created_at": t.created_at.to_rfc3339(),
                    }))
                    .collect::<Vec<_>>(),
            }),
            Outcome::Completed(t) => json!({ "task_id": t.id, "status": "completed", "title": t.title }),
            Outcome::AlreadyCompleted(t) => {
                json!({ "task_id": t.id, "status": "already_completed", "title": t.title })
            }
            Outcome::Reopened(t) => json!({ "task_id": t.id, "status": "reopened", "title": t.title }),
            Outcome::AlreadyPending(t) => {
                json!({ "task_id": t.id, "status": "already_pending", "title": t.title })
            }
            Outcome::Deleted(t) => json!({ "task_id": t.id, "status": "deleted", "title": t.title }),
            Outcome::Updated { task, changes } => json!({
                "task_id": task.id,
                "status": "updated",
                "title": task.title,
                "changes": changes,
            }),
        }
    }
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub outcome: Outcome,
    pub tool_call: ToolCall,
}

#[derive(Clone)]
pub struct Dispatcher {
    tasks: Arc<dyn TaskStore>,
}

impl Dispatcher {
    pub fn new(tasks: Arc<dyn TaskStore>) -> Self {
        Self { tasks }
    }

    /// Run `op` for `owner`.
    ///
    /// Complete and Reopen read the task first so a task already in the
    /// requested state is reported without writing.
    pub async fn dispatch(&self, owner: &str, op: Operation) -> Result<Dispatched, AgentError> {
        let name = op.name();
        let arguments = op.arguments();
        info!(owner, operation = name, "dispatching");

        let outcome = match op {
            Operation::Create(task) => Outcome::Created(self.tasks.create(owner, task).await?),
            Operation::List(filter) => Outcome::Listed {
                filter,
                tasks: self.tasks.list(owner, filter).await?,
            },
            Operation::Complete(id) => {
                let task = self.tasks.get(owner, id).await?;
                if task.completed {
                    Outcome::AlreadyCompleted(task)
                } else {
                    Outcome::Completed(self.tasks.update(owner, id, TaskPatch::completed(true)).await?)
                }
            }
            Operation::Reopen(id) => {
                let task = self.tasks.get(owner, id).await?;
                if task.completed {
                    Outcome::Reopened(self.tasks.update(owner, id, TaskPatch::completed(false)).await?)
                } else {
                    Outcome::AlreadyPending(task)
                }
            }
            Operation::Delete(id) => Outcome::Deleted(self.tasks.delete(owner, id).await?),
            Operation::Update(id, patch) => {
                let patch = patch.validated()?;
                let changes = patch.changed_fields();
                let task = if patch.is_empty() {
                    self.tasks.get(owner, id).await?
                } else {
                    self.tasks.update(owner, id, patch).await?
                };
                Outcome::Updated { task, changes }
            }
        };

        let tool_call = ToolCall {
            operation: name.to_owned(),
            arguments,
            result: outcome.result(),
        };
        Ok(Dispatched { outcome, tool_call })
    }

    /// List the owner's tasks for reference resolution.
    pub async fn candidates(&self, owner: &str) -> Result<Vec<Task>, AgentError> {
        self.tasks.list(owner, StatusFilter::All).await.inspect_err(|e| {
            warn!(owner, error = %e, "failed to load tasks for resolution");
        })
    }
}
