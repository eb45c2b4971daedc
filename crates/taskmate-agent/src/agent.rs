//! The turn pipeline.
//!
//! One call to [`TaskAgent::handle_turn`] moves through
//! `RECEIVED -> CLASSIFIED -> RESOLVED -> DISPATCHED -> FORMATTED`, or stops at
//! `CLARIFY_REQUESTED`. Nothing is written to the task store before
//! classification and, for targeted intents, resolution have both succeeded.
//! Every failure inside the pipeline becomes a reply; only conversation-level
//! failures are returned as `Err`.

use std::sync::Arc;

use serde::Serialize;
use strum::Display;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::classifier::Classifier;
use crate::context::{DEFAULT_HISTORY_WINDOW, TurnContext, TurnMeta};
use crate::dispatcher::{Dispatcher, Operation};
use crate::error::AgentError;
use crate::formatter::{format_cancel, format_error, format_help, format_outcome, format_recall};
use crate::intent::{Intent, IntentKind, PendingEdit};
use crate::resolver::resolve;
use crate::store::{ConversationLog, TaskStore};
use crate::types::{Conversation, Message, NewTask, TaskPatch, ToolCall};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnState {
    Received,
    Classified,
    Resolved,
    Dispatched,
    Formatted,
    ClarifyRequested,
}

/// What the caller gets back from one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReply {
    pub reply: String,
    pub conversation_id: String,
    /// Id of the stored assistant message.
    pub message_id: String,
    pub intent: IntentKind,
    pub tool_calls: Vec<ToolCall>,
}

/// Reply plus the metadata persisted alongside it.
struct Turn {
    reply: String,
    intent: IntentKind,
    tool_calls: Vec<ToolCall>,
    meta: TurnMeta,
}

impl Turn {
    fn ok(intent: IntentKind, reply: String) -> Self {
        Self {
            reply,
            intent,
            tool_calls: Vec::new(),
            meta: TurnMeta {
                intent: Some(intent),
                ..TurnMeta::default()
            },
        }
    }

    /// A failed turn. `pending` keeps the intent open for a follow-up target.
    fn failed(intent: IntentKind, err: &AgentError, pending: Option<IntentKind>) -> Self {
        let listed = match err {
            AgentError::Ambiguous { candidates, .. } => {
                Some(candidates.iter().map(|t| t.id).collect())
            }
            _ => None,
        };
        Self {
            reply: format_error(err),
            intent,
            tool_calls: Vec::new(),
            meta: TurnMeta {
                intent: Some(intent),
                listed,
                pending,
                ..TurnMeta::default()
            },
        }
    }
}

pub struct TaskAgent {
    tasks: Arc<dyn TaskStore>,
    log: Arc<dyn ConversationLog>,
    classifier: Arc<dyn Classifier>,
    dispatcher: Dispatcher,
    history_window: usize,
}

impl TaskAgent {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        log: Arc<dyn ConversationLog>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(tasks.clone()),
            tasks,
            log,
            classifier,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window.max(1);
        self
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// Handle one user utterance.
    ///
    /// A `None` conversation id starts a new conversation titled after the
    /// utterance. An unknown id, or one owned by someone else, is
    /// [`AgentError::ConversationNotFound`].
    pub async fn handle_turn(
        &self,
        owner: &str,
        conversation_id: Option<&str>,
        utterance: &str,
    ) -> Result<TurnReply, AgentError> {
        let conversation = self.open_conversation(owner, conversation_id, utterance).await?;
        let span = info_span!("turn", conversation_id = %conversation.id);
        async move {
            debug!(state = %TurnState::Received, conversation_id = %conversation.id);

            let history = self.log.recent(&conversation.id, self.history_window).await?;
            let ctx = TurnContext::from_history(&history, self.history_window);
            self.log
                .append(Message::user(&conversation.id, utterance))
                .await?;

            let turn = self.run(owner, &conversation.id, utterance, &ctx).await;

            let assistant = Message::assistant(
                &conversation.id,
                turn.reply.clone(),
                turn.tool_calls.clone(),
                turn.meta,
            );
            let message_id = assistant.id.clone();
            self.log.append(assistant).await?;
            self.log.touch_conversation(&conversation.id).await?;

            info!(intent = %turn.intent, tool_calls = turn.tool_calls.len(), "turn handled");
            Ok(TurnReply {
                reply: turn.reply,
                conversation_id: conversation.id.clone(),
                message_id,
                intent: turn.intent,
                tool_calls: turn.tool_calls,
            })
        }
        .instrument(span)
        .await
    }

    /// Remove every task and conversation the owner has.
    pub async fn purge_owner(&self, owner: &str) -> Result<(u64, u64), AgentError> {
        let tasks = self.tasks.purge_owner(owner).await?;
        let conversations = self.log.purge_conversations(owner).await?;
        info!(owner, tasks, conversations, "purged owner data");
        Ok((tasks, conversations))
    }

    async fn open_conversation(
        &self,
        owner: &str,
        conversation_id: Option<&str>,
        utterance: &str,
    ) -> Result<Conversation, AgentError> {
        match conversation_id {
            Some(id) => self
                .log
                .get_conversation(owner, id)
                .await?
                .ok_or_else(|| AgentError::ConversationNotFound(id.to_owned())),
            None => {
                let conversation = Conversation::start(owner, utterance);
                self.log.create_conversation(conversation.clone()).await?;
                info!(conversation_id = %conversation.id, owner, "conversation started");
                Ok(conversation)
            }
        }
    }

    async fn run(&self, owner: &str, conversation_id: &str, utterance: &str, ctx: &TurnContext) -> Turn {
        let intent = match self.classifier.classify(utterance, ctx).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!(error = %e, "classification failed");
                return Turn::failed(IntentKind::Clarify, &e, None);
            }
        };
        let kind = intent.kind();
        debug!(state = %TurnState::Classified, conversation_id, kind = %kind);

        let op = match intent {
            Intent::Clarify { prompt, pending } => {
                debug!(state = %TurnState::ClarifyRequested, conversation_id);
                let mut turn = Turn::ok(kind, prompt);
                turn.meta.pending = pending;
                return turn;
            }
            Intent::Help => return Turn::ok(kind, format_help()),
            Intent::Cancel => return Turn::ok(kind, format_cancel()),
            Intent::Recall => return Turn::ok(kind, format_recall(&ctx.window)),
            Intent::Create { title, description } => {
                match NewTask::new(&title, description.as_deref()) {
                    Ok(task) => Operation::Create(task),
                    Err(e) => return Turn::failed(kind, &e, None),
                }
            }
            Intent::List { filter } => Operation::List(filter),
            targeted => match self.resolve_target(owner, &targeted, ctx).await {
                Ok(op) => {
                    debug!(state = %TurnState::Resolved, conversation_id, kind = %kind);
                    op
                }
                Err(e) => {
                    debug!(error = %e, "reference not resolved");
                    let pending = matches!(e, AgentError::NotFound(_) | AgentError::Ambiguous { .. })
                        .then_some(kind);
                    let mut turn = Turn::failed(kind, &e, pending);
                    turn.meta.edit = pending.and(PendingEdit::of(&targeted));
                    return turn;
                }
            },
        };

        match self.dispatcher.dispatch(owner, op.clone()).await {
            Ok(done) => {
                debug!(state = %TurnState::Dispatched, conversation_id, operation = op.name());
                let reply = format_outcome(&done.outcome);
                debug!(state = %TurnState::Formatted, conversation_id);
                Turn {
                    reply,
                    intent: kind,
                    meta: TurnMeta {
                        intent: Some(kind),
                        listed: done.outcome.listed(),
                        focus: done.outcome.focus(),
                        pending: None,
                        edit: None,
                    },
                    tool_calls: vec![done.tool_call],
                }
            }
            Err(e) => {
                warn!(error = %e, operation = op.name(), "dispatch failed");
                let mut turn = Turn::failed(kind, &e, None);
                turn.tool_calls.push(op.failed_call(&e));
                turn
            }
        }
    }

    /// Resolve the reference of a targeted intent into an operation.
    async fn resolve_target(
        &self,
        owner: &str,
        intent: &Intent,
        ctx: &TurnContext,
    ) -> Result<Operation, AgentError> {
        let reference = intent
            .reference()
            .ok_or_else(|| AgentError::ClassifyFailed("intent carries no reference".into()))?;
        let candidates = self.dispatcher.candidates(owner).await?;
        let task = resolve(reference, &candidates, ctx)?;
        let op = match intent {
            Intent::Complete { .. } => Operation::Complete(task.id),
            Intent::Reopen { .. } => Operation::Reopen(task.id),
            Intent::Delete { .. } => Operation::Delete(task.id),
            Intent::Update {
                title, description, ..
            } => Operation::Update(
                task.id,
                TaskPatch {
                    title: title.clone(),
                    description: description.clone(),
                    completed: None,
                },
            ),
            _ => {
                return Err(AgentError::ClassifyFailed(format!(
                    "{} does not target a task",
                    intent.kind()
                )));
            }
        };
        Ok(op)
    }
}
