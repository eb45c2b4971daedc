//! Conversation context derived from the message log.
//!
//! The server keeps no per-conversation state between requests. Everything a
//! follow-up needs ("the second one", "mark it done") is recovered from the
//! [`TurnMeta`] attached to earlier assistant messages.

use serde::{Deserialize, Serialize};

use crate::intent::{IntentKind, PendingEdit};
use crate::types::{Message, Role, TaskId};

/// Default number of trailing messages consulted per turn.
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// Structured facts recorded on every assistant message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnMeta {
    /// Kind the turn was classified as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentKind>,
    /// Task ids shown to the user, in display order. Set by listings and by
    /// ambiguity replies that enumerate candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listed: Option<Vec<TaskId>>,
    /// The single task this turn acted on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<TaskId>,
    /// Kind still waiting for a target after this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<IntentKind>,
    /// Field values of a pending update, kept until its target is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<PendingEdit>,
}

/// What one turn knows about the conversation before it runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnContext {
    /// Trailing messages, most recent first.
    pub window: Vec<Message>,
    pub last_listing: Option<Vec<TaskId>>,
    pub focus: Option<TaskId>,
    /// Most recent kind that completed without leaving anything pending.
    pub last_intent: Option<IntentKind>,
    /// Kind awaiting a target, taken from the latest assistant turn only.
    pub pending: Option<IntentKind>,
    /// Open update values, same lifetime as `pending`.
    pub pending_edit: Option<PendingEdit>,
}

impl TurnContext {
    /// Build from chronologically ordered history, keeping at most `window`
    /// messages.
    pub fn from_history(messages: &[Message], window: usize) -> Self {
        let skip = messages.len().saturating_sub(window);
        let window: Vec<Message> = messages[skip..].iter().rev().cloned().collect();

        let mut ctx = TurnContext::default();
        let mut seen_assistant = false;
        for meta in window
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .filter_map(|m| m.meta.as_ref())
        {
            if !seen_assistant {
                ctx.pending = meta.pending;
                ctx.pending_edit = meta.pending.and(meta.edit.clone());
                seen_assistant = true;
            }
            if ctx.last_listing.is_none() {
                ctx.last_listing = meta.listed.clone();
            }
            if ctx.focus.is_none() {
                ctx.focus = meta.focus;
            }
            if ctx.last_intent.is_none() && meta.pending.is_none() {
                ctx.last_intent = meta.intent.filter(|k| *k != IntentKind::Clarify);
            }
        }
        ctx.window = window;
        ctx
    }

    /// The kind a bare reference should inherit: a pending clarification
    /// first, then the last reference-taking intent.
    pub fn follow_up_kind(&self) -> Option<IntentKind> {
        self.pending
            .or(self.last_intent.filter(|k| k.takes_reference()))
    }

    /// Whether any earlier turn happened in this conversation.
    pub fn is_fresh(&self) -> bool {
        self.window.is_empty()
    }
}
