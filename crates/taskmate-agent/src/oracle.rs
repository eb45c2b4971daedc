//! Classification backed by an external text-completion service.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classifier::{Classifier, UNKNOWN_PROMPT, prompt_for};
use crate::context::TurnContext;
use crate::error::AgentError;
use crate::intent::{Intent, IntentKind};
use crate::types::{Role, StatusFilter};

/// One chat message sent to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// An opaque text-completion service.
#[async_trait]
pub trait CompletionOracle: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, AgentError>;
}

pub const SYSTEM_PROMPT: &str = r#"You classify messages sent to a personal to-do list assistant.
Reply with a single JSON object and nothing else:
{"intent": "create" | "list" | "complete" | "reopen" | "delete" | "update" | "recall" | "help" | "cancel" | "clarify",
 "title": string or null, "description": string or null,
 "filter": "all" | "pending" | "completed" | null,
 "reference": string or null, "prompt": string or null}
"reference" is how the user named the task ("task 3", "the second one", "groceries").
For "update", "title" and "description" are the new values.
Use "cancel" when the user declines or calls off what they were doing.
Use "clarify" with a short "prompt" when the request is unclear."#;

/// The JSON object the oracle is asked to produce.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OracleVerdict {
    pub intent: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl OracleVerdict {
    /// Parse the first verdict object embedded in `raw`.
    ///
    /// Each `{` is tried as the start of a JSON value; text after the value
    /// is ignored, so prose with its own braces around the object is fine.
    pub fn parse(raw: &str) -> Result<Self, AgentError> {
        let mut last_error = None;
        for (start, _) in raw.match_indices('{') {
            let mut values = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Self>();
            match values.next() {
                Some(Ok(verdict)) => return Ok(verdict),
                Some(Err(e)) => last_error = Some(e),
                None => {}
            }
        }
        Err(AgentError::ClassifyFailed(match last_error {
            Some(e) => format!("oracle reply is not a verdict: {e}"),
            None => "oracle reply contained no JSON object".into(),
        }))
    }

    pub fn into_intent(self) -> Result<Intent, AgentError> {
        let kind = IntentKind::from_str(self.intent.trim()).map_err(|_| {
            AgentError::ClassifyFailed(format!("unknown intent '{}'", self.intent))
        })?;
        let non_empty = |s: Option<String>| s.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let reference = non_empty(self.reference);
        let title = non_empty(self.title);
        let description = non_empty(self.description);

        let intent = match kind {
            IntentKind::Create => match title {
                Some(title) => Intent::Create { title, description },
                None => Intent::clarify(prompt_for(kind), Some(kind)),
            },
            IntentKind::List => Intent::List {
                filter: self
                    .filter
                    .as_deref()
                    .and_then(|f| StatusFilter::from_str(f.trim()).ok())
                    .unwrap_or_default(),
            },
            IntentKind::Update => match reference {
                Some(reference) => Intent::Update {
                    reference,
                    title,
                    description,
                },
                None => Intent::clarify(prompt_for(kind), Some(kind)),
            },
            IntentKind::Complete | IntentKind::Reopen | IntentKind::Delete => reference
                .and_then(|r| Intent::with_reference(kind, r))
                .unwrap_or_else(|| Intent::clarify(prompt_for(kind), Some(kind))),
            IntentKind::Recall => Intent::Recall,
            IntentKind::Help => Intent::Help,
            IntentKind::Cancel => Intent::Cancel,
            IntentKind::Clarify => Intent::clarify(
                non_empty(self.prompt).unwrap_or_else(|| UNKNOWN_PROMPT.to_owned()),
                None,
            ),
        };
        Ok(intent)
    }
}

/// Asks a [`CompletionOracle`] to classify the utterance.
pub struct OracleClassifier {
    oracle: Arc<dyn CompletionOracle>,
}

impl OracleClassifier {
    pub fn new(oracle: Arc<dyn CompletionOracle>) -> Self {
        Self { oracle }
    }

    /// System prompt, the trailing window oldest first, then the utterance.
    pub fn build_prompt(utterance: &str, ctx: &TurnContext) -> Vec<PromptMessage> {
        let mut messages = Vec::with_capacity(ctx.window.len() + 2);
        messages.push(PromptMessage::new(Role::System, SYSTEM_PROMPT));
        messages.extend(
            ctx.window
                .iter()
                .rev()
                .map(|m| PromptMessage::new(m.role, m.content.clone())),
        );
        messages.push(PromptMessage::new(Role::User, utterance));
        messages
    }
}

#[async_trait]
impl Classifier for OracleClassifier {
    async fn classify(&self, utterance: &str, ctx: &TurnContext) -> Result<Intent, AgentError> {
        let prompt = Self::build_prompt(utterance, ctx);
        let raw = self.oracle.complete(&prompt).await.map_err(|e| {
            warn!(error = %e, "completion oracle failed");
            match e {
                AgentError::ClassifyFailed(_) => e,
                other => AgentError::ClassifyFailed(other.to_string()),
            }
        })?;
        debug!(reply_len = raw.len(), "oracle replied");
        OracleVerdict::parse(&raw)?.into_intent()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::Message;

    struct Canned(Result<String, AgentError>);

    #[async_trait]
    impl CompletionOracle for Canned {
        async fn complete(&self, _: &[PromptMessage]) -> Result<String, AgentError> {
            self.0.clone()
        }
    }

    fn classifier(reply: Result<&str, AgentError>) -> OracleClassifier {
        OracleClassifier::new(Arc::new(Canned(reply.map(str::to_owned))))
    }

    #[tokio::test]
    async fn verdict_wrapped_in_prose_is_parsed() {
        let oracle = classifier(Ok(
            "Sure! {\"intent\": \"create\", \"title\": \"Book dentist\", \"description\": null}",
        ));
        let intent = oracle
            .classify("I should see a dentist", &TurnContext::default())
            .await
            .unwrap();
        assert_eq!(
            intent,
            Intent::Create {
                title: "Book dentist".into(),
                description: None
            }
        );
    }

    #[test]
    fn verdict_is_found_between_other_braces() {
        let raw = "Format is {intent, title}. Here you go: {\"intent\": \"delete\", \"reference\": \"task 2\"} (hope that {helps})";
        let verdict = OracleVerdict::parse(raw).unwrap();
        assert_eq!(verdict.intent, "delete");
        assert_eq!(verdict.reference.as_deref(), Some("task 2"));

        let nested = r#"{"intent": "create", "title": "Plan {party}", "description": null} {"intent": "help"}"#;
        assert_eq!(OracleVerdict::parse(nested).unwrap().title.as_deref(), Some("Plan {party}"));

        assert!(OracleVerdict::parse("just {braces} here").is_err());
    }

    #[tokio::test]
    async fn list_filter_defaults_to_all() {
        let oracle = classifier(Ok(r#"{"intent": "list", "filter": "bogus"}"#));
        let intent = oracle.classify("x", &TurnContext::default()).await.unwrap();
        assert_eq!(
            intent,
            Intent::List {
                filter: StatusFilter::All
            }
        );
    }

    #[tokio::test]
    async fn garbage_reply_is_classify_failed() {
        let oracle = classifier(Ok("no idea"));
        let err = oracle.classify("x", &TurnContext::default()).await.unwrap_err();
        assert_eq!(err.code(), "classify_failed");

        let oracle = classifier(Ok(r#"{"intent": "dance"}"#));
        let err = oracle.classify("x", &TurnContext::default()).await.unwrap_err();
        assert_eq!(err.code(), "classify_failed");
    }

    #[tokio::test]
    async fn oracle_outage_is_classify_failed() {
        let oracle = classifier(Err(AgentError::StoreUnavailable("timeout".into())));
        let err = oracle.classify("x", &TurnContext::default()).await.unwrap_err();
        assert!(matches!(err, AgentError::ClassifyFailed(_)));
    }

    #[test]
    fn prompt_orders_window_oldest_first() {
        let history = vec![
            Message::user("c1", "first"),
            Message::user("c1", "second"),
        ];
        let ctx = TurnContext::from_history(&history, 20);
        let prompt = OracleClassifier::build_prompt("third", &ctx);
        let contents: Vec<&str> = prompt.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents[1..], ["first", "second", "third"]);
        assert_eq!(prompt[0].role, Role::System);
    }
}
