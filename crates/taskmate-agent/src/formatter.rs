//! Deterministic natural-language replies.
//!
//! Every reply is built from fixed templates so the same outcome always reads
//! the same way. Listings and ambiguity replies are numbered from 1 in the
//! order their ids are recorded, which is what ordinal follow-ups count over.

use std::fmt::Write as _;

use crate::dispatcher::Outcome;
use crate::error::AgentError;
use crate::types::{MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS, Message, StatusFilter, Task, ToolCall};

pub const HELP_TEXT: &str = "I'm your task assistant. Here's what I can do:
- Add tasks: \"add buy groceries\", \"remind me to call mom\"
- Show tasks: \"show my tasks\", \"what's left?\", \"show completed tasks\"
- Complete tasks: \"mark task 1 as done\", \"I finished the report\"
- Reopen tasks: \"mark the report as not done\"
- Update tasks: \"rename groceries to weekly shop\", \"change the description of task 2 to ...\"
- Delete tasks: \"delete task 3\", \"remove the groceries task\"
After a list you can refer to tasks as \"the first one\", \"the second one\", or \"it\".";

fn quoted(title: &str) -> String {
    format!("'{title}'")
}

fn task_line(out: &mut String, position: usize, task: &Task) {
    let mark = if task.completed { 'x' } else { ' ' };
    let _ = write!(out, "\n{position}. [{mark}] {}", task.title);
    if !task.description.is_empty() {
        let _ = write!(out, " - {}", task.description);
    }
}

/// Join with commas and a final "and".
fn join_words(words: &[&str]) -> String {
    match words {
        [] => String::new(),
        [one] => (*one).to_owned(),
        [a, b] => format!("{a} and {b}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

fn format_listing(filter: StatusFilter, tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return match filter {
            StatusFilter::All => "No tasks yet. Would you like to add one?",
            StatusFilter::Pending => "No pending tasks. Nice!",
            StatusFilter::Completed => "You haven't completed any tasks yet.",
        }
        .to_owned();
    }

    let count = tasks.len();
    let mut out = match filter {
        StatusFilter::Pending => format!("You have {} pending:", plural(count, "task")),
        StatusFilter::Completed => format!("You've completed {}:", plural(count, "task")),
        StatusFilter::All => {
            let done = tasks.iter().filter(|t| t.completed).count();
            let pending = count - done;
            let mut parts = Vec::new();
            if pending > 0 {
                parts.push(format!("{pending} pending"));
            }
            if done > 0 {
                parts.push(format!("{done} completed"));
            }
            format!("You have {} ({}):", plural(count, "task"), parts.join(", "))
        }
    };
    for (i, task) in tasks.iter().enumerate() {
        task_line(&mut out, i + 1, task);
    }
    out
}

pub fn format_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Created(task) => {
            let mut out = format!("Added {} to your list.", quoted(&task.title));
            if !task.description.is_empty() {
                let _ = write!(out, " ({})", task.description);
            }
            out
        }
        Outcome::Listed { filter, tasks } => format_listing(*filter, tasks),
        Outcome::Completed(task) => format!("Marked {} as complete.", quoted(&task.title)),
        Outcome::AlreadyCompleted(task) => format!("{} is already complete.", quoted(&task.title)),
        Outcome::Reopened(task) => format!("Marked {} as not done.", quoted(&task.title)),
        Outcome::AlreadyPending(task) => format!("{} is already pending.", quoted(&task.title)),
        Outcome::Deleted(task) => format!("Deleted {}.", quoted(&task.title)),
        Outcome::Updated { task, changes } if changes.is_empty() => {
            format!("No changes were made to {}.", quoted(&task.title))
        }
        Outcome::Updated { task, changes } => format!(
            "Updated the {} of {}.",
            join_words(changes),
            quoted(&task.title)
        ),
    }
}

pub fn format_error(err: &AgentError) -> String {
    match err {
        AgentError::NotFound(reference) if reference.is_empty() => {
            "I couldn't find that task. Would you like me to show you your current tasks?".to_owned()
        }
        AgentError::NotFound(reference) => format!(
            "I couldn't find a task matching {}. Would you like me to show you your current tasks?",
            quoted(reference)
        ),
        AgentError::Ambiguous {
            reference,
            candidates,
        } => {
            let mut out = format!(
                "{} matches {}:",
                quoted(reference),
                plural(candidates.len(), "task")
            );
            for (i, task) in candidates.iter().enumerate() {
                task_line(&mut out, i + 1, task);
            }
            out.push_str("\nWhich one did you mean? You can say \"the first one\" or \"the second one\".");
            out
        }
        AgentError::Validation(detail) => format!(
            "There was a problem with the task details: {detail}. Titles need 1 to {MAX_TITLE_CHARS} characters and descriptions at most {MAX_DESCRIPTION_CHARS}."
        ),
        AgentError::Unauthorized(_) => {
            "You don't have permission to access that task. Please make sure you're referring to one of your own tasks.".to_owned()
        }
        AgentError::StoreUnavailable(_) => {
            "I'm having trouble accessing your tasks right now. Please try again in a moment.".to_owned()
        }
        AgentError::ClassifyFailed(_) => {
            "I didn't quite understand that. Could you try rephrasing your request?".to_owned()
        }
        AgentError::ConversationNotFound(_) => {
            "I couldn't find that conversation. Start a new one to keep going.".to_owned()
        }
    }
}

pub fn format_help() -> String {
    HELP_TEXT.to_owned()
}

pub fn format_cancel() -> String {
    "Okay, I've left your tasks as they are.".to_owned()
}

fn describe_call(call: &ToolCall) -> Option<String> {
    let result = &call.result;
    let status = result["status"].as_str().unwrap_or_default();
    let title = result["title"].as_str().map(quoted).unwrap_or_default();
    let line = match (call.operation.as_str(), status) {
        (_, "error") => return None,
        ("add_task", _) => format!("Added {title}"),
        ("list_tasks", _) => {
            let count = result["count"].as_u64().unwrap_or(0) as usize;
            let filter = result["filter_applied"].as_str().unwrap_or("all");
            match filter {
                "all" => format!("Listed {}", plural(count, "task")),
                other => format!("Listed {} {other}", count),
            }
        }
        ("complete_task", "already_completed") => format!("Checked {title}, already complete"),
        ("complete_task", _) => format!("Completed {title}"),
        ("reopen_task", "already_pending") => format!("Checked {title}, already pending"),
        ("reopen_task", _) => format!("Reopened {title}"),
        ("delete_task", _) => format!("Deleted {title}"),
        ("update_task", _) => format!("Updated {title}"),
        (other, _) => format!("Ran {other}"),
    };
    Some(line)
}

/// Summarise the operations recorded in `window` (most recent first).
pub fn format_recall(window: &[Message]) -> String {
    let lines: Vec<String> = window
        .iter()
        .rev()
        .flat_map(|m| m.tool_calls.iter())
        .filter_map(describe_call)
        .collect();
    if lines.is_empty() {
        return "We haven't changed anything in this conversation yet.".to_owned();
    }
    let mut out = String::from("Here's what we've done so far:");
    for line in lines {
        let _ = write!(out, "\n- {line}");
    }
    out
}
