//! Utterance classification.
//!
//! [`RuleClassifier`] is deterministic and needs no network. Rules are
//! anchored at the start of the (filler-stripped) utterance and tried in a
//! fixed priority order: greeting and help, refusal, create, reopen,
//! complete, update, delete, recall, list, then bare follow-up references.
//! A leading create verb wins over any completion words in the new title.
//! Negated completion phrases ("not done") are tried before completion words
//! so they reopen instead of complete.
//!
//! [`FallbackClassifier`] runs the rules first and consults a second
//! classifier (normally [`crate::oracle::OracleClassifier`]) only when the
//! rules could not recognise the utterance at all.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::{Captures, Regex};
use tracing::debug;

use crate::context::TurnContext;
use crate::error::AgentError;
use crate::intent::{Intent, IntentKind};
use crate::types::StatusFilter;

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, utterance: &str, ctx: &TurnContext) -> Result<Intent, AgentError>;
}

pub const EMPTY_PROMPT: &str = "I didn't catch that. What would you like to do with your tasks?";
pub const UNKNOWN_PROMPT: &str = "I'm not sure what you'd like to do. You can add, list, complete, update, or delete tasks.";
pub const DANGLING_REFERENCE_PROMPT: &str =
    "What would you like to do with that task? You can complete, update, or delete it.";

/// Question asked when an intent is recognised but its target is missing.
pub fn prompt_for(kind: IntentKind) -> &'static str {
    match kind {
        IntentKind::Create => "What should the task be called?",
        IntentKind::Complete => "Which task did you finish?",
        IntentKind::Reopen => "Which task should I mark as not done?",
        IntentKind::Delete => "Which task should I delete?",
        IntentKind::Update => "Which task should I update, and what should change?",
        _ => UNKNOWN_PROMPT,
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("classifier pattern must compile")
}

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| re($re));
    };
}

// ── normalisation ──────────────────────────────────────────────────────────

pattern!(
    LEADING_FILLER,
    r"(?i)^(?:(?:please|pls|kindly|ok|okay|so|and|also|now|then|hey|hi|hello|can\s+you|could\s+you|would\s+you|will\s+you|i\s+want\s+to|i'd\s+like\s+to|i\s+would\s+like\s+to|let's|lets)[\s,!]+)+"
);
pattern!(
    TRAILING_FILLER,
    r"(?i)[\s,]*(?:please|pls|thanks|thank\s+you)?[\s.!?]*$"
);
pattern!(
    GREETING,
    r"(?i)^(?:hi|hello|hey|hiya|greetings|good\s+(?:morning|afternoon|evening))(?:\s+there)?[\s,.!?]*$"
);
pattern!(
    HELP,
    r"(?i)^(?:help|help\s+me|\?+|what\s+can\s+you\s+do|what\s+do\s+you\s+do|how\s+(?:do\s+i|does\s+this\s+work|to)\b.*|commands|capabilities)$"
);
pattern!(
    NEGATIVE,
    r"(?i)^(?:no|nope|nah|no\s+way|cancel|cancel\s+that|never\s*mind|nvm|forget\s+it|don't|dont|do\s+not|stop|abort|skip\s+it|leave\s+it|none|neither|none\s+of\s+(?:them|those)|neither\s+of\s+(?:them|those)|nothing)$"
);
pattern!(
    QUESTION_LEAD,
    r"(?i)^(?:what|what's|whats|which|how|show|list|are|is|do|does|did)\b"
);

// ── reopen ─────────────────────────────────────────────────────────────────

pattern!(
    REOPEN_MARK,
    r"(?i)^(?:mark|set|move|put)\s+(?P<r>.+?)\s+(?:as\s+|to\s+|back\s+to\s+|back\s+as\s+)?(?:not\s+(?:done|complete|completed|finished)|incomplete|undone|unfinished|pending|open|to\s*-?\s*do)$"
);
pattern!(
    REOPEN_IS_NOT,
    r"(?i)^(?P<r>.+?)\s+(?:is\s+not|isn't|isnt|was\s+not|wasn't|wasnt)\s+(?:really\s+)?(?:done|complete|completed|finished)(?:\s+yet)?$"
);
pattern!(
    REOPEN_VERB,
    r"(?i)^(?:reopen|re-open|uncomplete|un-complete|unmark|uncheck|untick|undo|restore)\b\s*(?P<r>.*)$"
);

// ── complete ───────────────────────────────────────────────────────────────

pattern!(
    COMPLETE_MARK,
    r"(?i)^(?:mark|set|flag)\s+(?P<r>.+?)\s+(?:as\s+)?(?:done|complete|completed|finished)$"
);
pattern!(COMPLETE_OFF, r"(?i)^(?:check|tick|cross)\s+(?P<r>.+?)\s+off$");
pattern!(
    COMPLETE_VERB,
    r"(?i)^(?:complete|finish|check\s+off|tick\s+off|cross\s+off|tick|close)\b\s*(?P<r>.*)$"
);
pattern!(
    COMPLETE_I_DID,
    r"(?i)^i(?:'ve|\s+have)?\s+(?:just\s+|already\s+|finally\s+)?(?:finished|completed|did|done\s+with|done)\s+(?P<r>.+)$"
);
pattern!(
    COMPLETE_IS_DONE,
    r"(?i)^(?P<r>.+?)\s+(?:is|are|was)\s+(?:now\s+|all\s+)?(?:done|complete|completed|finished)$"
);
pattern!(
    COMPLETE_BARE,
    r"(?i)^(?:done|finished|mark\s+(?:as\s+)?(?:done|complete|completed))$"
);

// ── create ─────────────────────────────────────────────────────────────────

pattern!(
    CREATE_VERB,
    r"(?i)^(?:add|create|make|new|insert|jot\s+down|note\s+down|put\s+down)\b\s*(?P<rest>.*)$"
);
pattern!(
    CREATE_REMIND,
    r"(?i)^(?:remind\s+me\s+to|don't\s+forget\s+to|dont\s+forget\s+to|remember\s+to|i\s+need\s+to|i\s+have\s+to|i\s+must|i\s+should|i\s+gotta)\s+(?P<rest>.+)$"
);
pattern!(CREATE_LABEL, r"(?i)^(?:task|todo|to-do)\s*:\s*(?P<rest>.+)$");
pattern!(
    DESC_WITH,
    r"(?i)\s*,?\s*\bwith\s+(?:(?:a|an|the)\s+)?(?:description|desc|details?|notes?)\b\s*(?:of\s+)?[:\-]?\s*(?P<d>.+)$"
);
pattern!(
    DESC_LABEL,
    r"(?i)[\s,;]+(?:description|desc|details?|notes?)\s*:\s*(?P<d>.+)$"
);
pattern!(DESC_DASH, r"\s+[-–—]\s+(?P<d>.+)$");
pattern!(DESC_PAREN, r"\s*\((?P<d>[^()]+)\)$");
pattern!(
    TITLE_LEAD,
    r"(?i)^(?:(?:a|an|the|another)\s+)?(?:new\s+)?(?:task|todo|to-do|item|reminder)\b\s*[:\-]?\s*"
);
pattern!(TITLE_NAMED, r"(?i)^(?:called|named|titled|to)\s+");
pattern!(
    LIST_SUFFIX,
    r"(?i)\s+(?:to|on|onto|in|from|off)\s+(?:my\s+|the\s+)?(?:list|tasks|task\s+list|todo\s+list|to-do\s+list|todos|to-dos)$"
);

// ── update ─────────────────────────────────────────────────────────────────

pattern!(
    UPDATE_RENAME,
    r"(?i)^(?:rename|retitle)\s+(?P<r>.+?)\s+(?:to|as)\s+(?P<v>.+)$"
);
pattern!(
    UPDATE_FIELD_OF,
    r"(?i)^(?:change|update|edit|modify|set)\s+(?:the\s+)?(?P<f>title|name|description|desc|details|notes?)\s+(?:of|for|on)\s+(?P<r>.+?)\s+to\s+(?P<v>.+)$"
);
pattern!(
    UPDATE_FIELD,
    r"(?i)^(?:change|update|edit|modify|set)\s+(?P<r>.+?)(?:'s|\s)\s*(?P<f>title|name|description|desc|details|notes?)\s+(?:to|as)\s+(?P<v>.+)$"
);
pattern!(
    UPDATE_TO,
    r"(?i)^(?:change|update|edit|modify)\s+(?P<r>.+?)\s+to\s+(?P<v>.+)$"
);
pattern!(
    UPDATE_BARE,
    r"(?i)^(?:change|update|edit|modify|rename|retitle)\b\s*(?P<r>.*)$"
);

// ── delete ─────────────────────────────────────────────────────────────────

pattern!(
    DELETE_VERB,
    r"(?i)^(?:delete|remove|drop|erase|cancel|trash|discard|scratch|get\s+rid\s+of|forget\s+about|forget)\b\s*(?P<r>.*)$"
);

// ── recall and list ────────────────────────────────────────────────────────

pattern!(
    RECALL,
    r"(?i)\bwhat\s+did\s+(?:i|we|you)\s+(?:just\s+)?(?:do|say|ask|change|add|delete)\b|\bwhat\s+have\s+(?:we|you)\s+(?:done|changed|added)\b|\bearlier\b|\brecap\b|\bhistory\b|\bsummar(?:y|ize|ise)\b|\bwhat\s+happened\b|\bso\s+far\b"
);
pattern!(
    LIST_LEAD,
    r"(?i)^(?:show|list|display|view|see|get|give|print|what|what's|whats|which|how\s+many|count|tell|read|anything|do\s+i\s+have|are\s+there)\b"
);
pattern!(
    LIST_NOUN,
    r"(?i)\b(?:tasks|todos|to-dos|my\s+list|pending|completed|remaining|outstanding)\b"
);
pattern!(
    FILTER_NOT_DONE,
    r"(?i)\bnot\s+(?:yet\s+)?(?:done|complete|completed|finished)\b|\bincomplete\b|\bunfinished\b|\bundone\b"
);
pattern!(
    FILTER_ALL,
    r"(?i)\ball\b|\beverything\b|\bfull\s+list\b|\bentire\b|\bwhole\b"
);
pattern!(
    FILTER_COMPLETED,
    r"(?i)\bcompleted?\b|\bfinished\b|\bdone\b|\bchecked\s*off\b|\baccomplished\b"
);
pattern!(
    FILTER_PENDING,
    r"(?i)\bpending\b|\boutstanding\b|\bremaining\b|\bleft\b|\bto\s*-?\s*do\b|\bopen\b|\bactive\b|\bstill\s+need\b"
);

// ── follow-ups ─────────────────────────────────────────────────────────────

pattern!(
    REFERENCE_ONLY,
    r"(?i)^(?:(?:the|that|this)\s+)?(?:(?:first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth|last|latest|newest|oldest|\d+(?:st|nd|rd|th))(?:\s+(?:one|task|item))?|(?:task|item|todo|number|no\.?|id)\s*#?\s*\d+|#?\d+|it|that|this|that\s+one|this\s+one|the\s+one|that\s+task|this\s+task)$"
);

/// Map a listing query to its status filter.
///
/// Negated completion words are checked first so "not done" reads as
/// pending; after that "all" words win, then completed, then pending.
pub fn map_filter(text: &str) -> StatusFilter {
    if FILTER_NOT_DONE.is_match(text) {
        StatusFilter::Pending
    } else if FILTER_ALL.is_match(text) {
        StatusFilter::All
    } else if FILTER_COMPLETED.is_match(text) {
        StatusFilter::Completed
    } else if FILTER_PENDING.is_match(text) {
        StatusFilter::Pending
    } else {
        StatusFilter::All
    }
}

/// Extract a title and optional description from the text after a create verb.
///
/// Case is preserved. Returns `None` when no title is left.
pub fn parse_new_task(rest: &str) -> Option<(String, Option<String>)> {
    let mut text = rest.trim().to_owned();
    if let Some(m) = LIST_SUFFIX.find(&text) {
        text.truncate(m.start());
    }

    let mut description = None;
    for pattern in [&*DESC_WITH, &*DESC_LABEL, &*DESC_DASH, &*DESC_PAREN] {
        if let Some(caps) = pattern.captures(&text) {
            let d = clean_text(&caps["d"]);
            let start = caps.get(0).map_or(text.len(), |m| m.start());
            if !d.is_empty() {
                description = Some(d);
            }
            text.truncate(start);
            break;
        }
    }

    let text = TITLE_LEAD.replace(text.trim(), "");
    let text = TITLE_NAMED.replace(text.trim(), "");
    let title = clean_text(&text);
    (!title.is_empty()).then_some((title, description))
}

/// Trim edge punctuation and unwrap quotes that enclose the whole string.
fn clean_text(raw: &str) -> String {
    let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || "-:,.;!?".contains(c));
    let unquoted = ['"', '\'', '`']
        .iter()
        .find_map(|q| {
            trimmed
                .strip_prefix(*q)
                .and_then(|s| s.strip_suffix(*q))
        })
        .unwrap_or(trimmed);
    unquoted.trim().to_owned()
}

fn clean_reference(raw: &str) -> String {
    let mut text = raw.trim().to_owned();
    if let Some(m) = LIST_SUFFIX.find(&text) {
        text.truncate(m.start());
    }
    let text = text.trim();
    let text = text
        .strip_prefix("task:")
        .or_else(|| text.strip_prefix("Task:"))
        .unwrap_or(text);
    clean_text(text)
}

fn strip_filler(text: &str) -> String {
    let head = LEADING_FILLER.replace(text, "");
    TRAILING_FILLER.replace(head.trim(), "").trim().to_owned()
}

/// Build a reference-taking intent, or a targeted clarification when the
/// reference came out empty.
fn targeted(kind: IntentKind, reference: &str) -> Intent {
    let reference = clean_reference(reference);
    if reference.is_empty() {
        return Intent::clarify(prompt_for(kind), Some(kind));
    }
    Intent::with_reference(kind, reference)
        .unwrap_or_else(|| Intent::clarify(UNKNOWN_PROMPT, None))
}

fn field_update(caps: &Captures<'_>, field: Option<&str>) -> Intent {
    let value = clean_text(&caps["v"]);
    let is_description = field.is_some_and(|f| {
        let f = f.to_ascii_lowercase();
        f.starts_with("desc") || f.starts_with("detail") || f.starts_with("note")
    });
    let reference = clean_reference(&caps["r"]);
    if reference.is_empty() {
        return Intent::clarify(prompt_for(IntentKind::Update), Some(IntentKind::Update));
    }
    let (title, description) = if is_description {
        (None, Some(value))
    } else {
        ((!value.is_empty()).then_some(value), None)
    };
    Intent::Update {
        reference,
        title,
        description,
    }
}

/// Deterministic keyword classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core of [`Classifier::classify`].
    pub fn classify_text(&self, utterance: &str, ctx: &TurnContext) -> Intent {
        let text = utterance.trim();
        if text.is_empty() {
            return Intent::clarify(EMPTY_PROMPT, None);
        }
        if GREETING.is_match(text) {
            return Intent::Help;
        }
        let s = strip_filler(text);
        if s.is_empty() {
            return Intent::clarify(EMPTY_PROMPT, None);
        }
        let s = s.as_str();

        if HELP.is_match(s) {
            return Intent::Help;
        }
        if NEGATIVE.is_match(s) {
            return Intent::Cancel;
        }
        if let Some(intent) = Self::create(s) {
            return intent;
        }
        if let Some(intent) = Self::reopen(s) {
            return intent;
        }
        if let Some(intent) = Self::complete(s) {
            return intent;
        }
        if let Some(intent) = Self::update(s) {
            return intent;
        }
        if let Some(caps) = DELETE_VERB.captures(s) {
            return targeted(IntentKind::Delete, &caps["r"]);
        }
        if RECALL.is_match(s) {
            return Intent::Recall;
        }
        if LIST_LEAD.is_match(s) {
            return Intent::List {
                filter: map_filter(s),
            };
        }
        if let Some(intent) = Self::follow_up(s, ctx) {
            return intent;
        }
        if LIST_NOUN.is_match(s) {
            return Intent::List {
                filter: map_filter(s),
            };
        }
        // An open clarification treats the whole reply as its missing piece.
        match ctx.pending {
            Some(IntentKind::Create) => Self::create_from(s),
            Some(kind) if kind.takes_reference() => {
                targeted(kind, s).with_edit(ctx.pending_edit.as_ref())
            }
            _ => Intent::clarify(UNKNOWN_PROMPT, None),
        }
    }

    fn reopen(s: &str) -> Option<Intent> {
        if let Some(caps) = REOPEN_MARK.captures(s) {
            return Some(targeted(IntentKind::Reopen, &caps["r"]));
        }
        if !QUESTION_LEAD.is_match(s) {
            if let Some(caps) = REOPEN_IS_NOT.captures(s) {
                return Some(targeted(IntentKind::Reopen, &caps["r"]));
            }
        }
        REOPEN_VERB
            .captures(s)
            .map(|caps| targeted(IntentKind::Reopen, &caps["r"]))
    }

    fn complete(s: &str) -> Option<Intent> {
        if COMPLETE_BARE.is_match(s) {
            return Some(Intent::clarify(
                prompt_for(IntentKind::Complete),
                Some(IntentKind::Complete),
            ));
        }
        for pattern in [&*COMPLETE_MARK, &*COMPLETE_OFF, &*COMPLETE_VERB, &*COMPLETE_I_DID] {
            if let Some(caps) = pattern.captures(s) {
                return Some(targeted(IntentKind::Complete, &caps["r"]));
            }
        }
        if !QUESTION_LEAD.is_match(s) {
            if let Some(caps) = COMPLETE_IS_DONE.captures(s) {
                return Some(targeted(IntentKind::Complete, &caps["r"]));
            }
        }
        None
    }

    fn create(s: &str) -> Option<Intent> {
        [&*CREATE_VERB, &*CREATE_REMIND, &*CREATE_LABEL]
            .into_iter()
            .find_map(|pattern| pattern.captures(s))
            .map(|caps| Self::create_from(&caps["rest"]))
    }

    fn create_from(rest: &str) -> Intent {
        match parse_new_task(rest) {
            Some((title, description)) => Intent::Create { title, description },
            None => Intent::clarify(prompt_for(IntentKind::Create), Some(IntentKind::Create)),
        }
    }

    fn update(s: &str) -> Option<Intent> {
        if let Some(caps) = UPDATE_RENAME.captures(s) {
            return Some(field_update(&caps, None));
        }
        for pattern in [&*UPDATE_FIELD_OF, &*UPDATE_FIELD] {
            if let Some(caps) = pattern.captures(s) {
                let field = caps.name("f").map(|m| m.as_str());
                return Some(field_update(&caps, field));
            }
        }
        if let Some(caps) = UPDATE_TO.captures(s) {
            return Some(field_update(&caps, None));
        }
        UPDATE_BARE
            .captures(s)
            .map(|caps| targeted(IntentKind::Update, &caps["r"]))
    }

    fn follow_up(s: &str, ctx: &TurnContext) -> Option<Intent> {
        if !REFERENCE_ONLY.is_match(s) {
            return None;
        }
        let intent = match ctx.follow_up_kind().filter(|k| k.takes_reference()) {
            Some(kind) => targeted(kind, s).with_edit(ctx.pending_edit.as_ref()),
            None => Intent::clarify(DANGLING_REFERENCE_PROMPT, None),
        };
        Some(intent)
    }
}

#[async_trait]
impl Classifier for RuleClassifier {
    async fn classify(&self, utterance: &str, ctx: &TurnContext) -> Result<Intent, AgentError> {
        let intent = self.classify_text(utterance, ctx);
        debug!(kind = %intent.kind(), "rule classification");
        Ok(intent)
    }
}

/// Rules first, a second opinion only for unrecognised utterances.
pub struct FallbackClassifier {
    rules: RuleClassifier,
    fallback: Option<Arc<dyn Classifier>>,
}

impl FallbackClassifier {
    pub fn new(fallback: Option<Arc<dyn Classifier>>) -> Self {
        Self {
            rules: RuleClassifier::new(),
            fallback,
        }
    }
}

#[async_trait]
impl Classifier for FallbackClassifier {
    async fn classify(&self, utterance: &str, ctx: &TurnContext) -> Result<Intent, AgentError> {
        let intent = self.rules.classify_text(utterance, ctx);
        let unrecognised = matches!(&intent, Intent::Clarify { pending: None, .. })
            && !utterance.trim().is_empty();
        match (&self.fallback, unrecognised) {
            (Some(fallback), true) => {
                debug!("rules did not match; consulting fallback classifier");
                fallback.classify(utterance, ctx).await
            }
            _ => Ok(intent),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::TurnMeta;
    use crate::intent::PendingEdit;
    use crate::types::Message;

    fn classify(utterance: &str) -> Intent {
        RuleClassifier::new().classify_text(utterance, &TurnContext::default())
    }

    fn reference_of(intent: &Intent) -> &str {
        intent.reference().unwrap_or_default()
    }

    #[test]
    fn create_keeps_title_case() {
        assert_eq!(
            classify("Add buy groceries"),
            Intent::Create {
                title: "buy groceries".into(),
                description: None
            }
        );
        assert_eq!(
            classify("please add a new task called 'Call Mom'"),
            Intent::Create {
                title: "Call Mom".into(),
                description: None
            }
        );
    }

    #[test]
    fn create_variants_extract_title() {
        for (utterance, title) in [
            ("remind me to call mom", "call mom"),
            ("create a task to finish the report", "finish the report"),
            ("add milk to my list", "milk"),
            ("can you add pay rent please", "pay rent"),
            ("task: water plants", "water plants"),
            ("add write notes for the meeting", "write notes for the meeting"),
        ] {
            match classify(utterance) {
                Intent::Create { title: got, .. } => assert_eq!(got, title, "{utterance}"),
                other => panic!("{utterance}: expected create, got {other:?}"),
            }
        }
    }

    #[test]
    fn create_verb_wins_over_completion_words_in_title() {
        for (utterance, title) in [
            ("Add check the laundry is done", "check the laundry is done"),
            ("add make sure the report is finished", "make sure the report is finished"),
            ("remind me to check the oven isn't done", "check the oven isn't done"),
        ] {
            match classify(utterance) {
                Intent::Create { title: got, .. } => assert_eq!(got, title, "{utterance}"),
                other => panic!("{utterance}: expected create, got {other:?}"),
            }
        }
    }

    #[test]
    fn create_peels_description() {
        for (utterance, title, description) in [
            ("add buy milk with description get 2% milk", "buy milk", "get 2% milk"),
            ("add buy milk - the oat kind", "buy milk", "the oat kind"),
            ("add book flights (for March)", "book flights", "for March"),
            ("add pay rent, notes: before the 5th", "pay rent", "before the 5th"),
        ] {
            assert_eq!(
                classify(utterance),
                Intent::Create {
                    title: title.into(),
                    description: Some(description.into())
                },
                "{utterance}"
            );
        }
    }

    #[test]
    fn create_without_title_asks_for_one() {
        assert_eq!(
            classify("add a task"),
            Intent::clarify(prompt_for(IntentKind::Create), Some(IntentKind::Create))
        );
    }

    #[test]
    fn list_filters_follow_keyword_priority() {
        for (utterance, filter) in [
            ("Show pending tasks", StatusFilter::Pending),
            ("show my tasks", StatusFilter::All),
            ("what's left to do?", StatusFilter::Pending),
            ("show completed tasks", StatusFilter::Completed),
            ("list all tasks including completed", StatusFilter::All),
            ("what is not done yet", StatusFilter::Pending),
            ("pending", StatusFilter::Pending),
        ] {
            assert_eq!(classify(utterance), Intent::List { filter }, "{utterance}");
        }
    }

    #[test]
    fn completion_phrases() {
        for (utterance, reference) in [
            ("mark the first one done", "the first one"),
            ("complete task 3", "task 3"),
            ("I finished the report", "the report"),
            ("check off groceries", "groceries"),
            ("tick groceries off", "groceries"),
            ("groceries is done", "groceries"),
            ("mark it as complete", "it"),
        ] {
            let intent = classify(utterance);
            assert_eq!(intent.kind(), IntentKind::Complete, "{utterance}");
            assert_eq!(reference_of(&intent), reference, "{utterance}");
        }
    }

    #[test]
    fn negated_completion_reopens() {
        for (utterance, reference) in [
            ("mark groceries as not done", "groceries"),
            ("reopen task 2", "task 2"),
            ("the report isn't done yet", "the report"),
            ("undo that", "that"),
        ] {
            let intent = classify(utterance);
            assert_eq!(intent.kind(), IntentKind::Reopen, "{utterance}");
            assert_eq!(reference_of(&intent), reference, "{utterance}");
        }
    }

    #[test]
    fn delete_and_missing_target() {
        let intent = classify("Delete task 2");
        assert_eq!(
            intent,
            Intent::Delete {
                reference: "task 2".into()
            }
        );
        assert_eq!(
            classify("remove the dentist appointment from my list"),
            Intent::Delete {
                reference: "the dentist appointment".into()
            }
        );
        assert_eq!(
            classify("delete"),
            Intent::clarify(prompt_for(IntentKind::Delete), Some(IntentKind::Delete))
        );
    }

    #[test]
    fn update_slots() {
        assert_eq!(
            classify("rename groceries to weekly shop"),
            Intent::Update {
                reference: "groceries".into(),
                title: Some("weekly shop".into()),
                description: None
            }
        );
        assert_eq!(
            classify("update task 1 title to New Title"),
            Intent::Update {
                reference: "task 1".into(),
                title: Some("New Title".into()),
                description: None
            }
        );
        assert_eq!(
            classify("change the description of task 2 to bring receipts"),
            Intent::Update {
                reference: "task 2".into(),
                title: None,
                description: Some("bring receipts".into())
            }
        );
        assert_eq!(
            classify("update groceries description to oat milk too"),
            Intent::Update {
                reference: "groceries".into(),
                title: None,
                description: Some("oat milk too".into())
            }
        );
    }

    #[test]
    fn greeting_help_and_recall() {
        assert_eq!(classify("hello!"), Intent::Help);
        assert_eq!(classify("what can you do?"), Intent::Help);
        assert_eq!(classify("what did I do earlier?"), Intent::Recall);
        assert_eq!(classify("recap please"), Intent::Recall);
    }

    #[test]
    fn unrecognised_and_empty_utterances_clarify() {
        assert_eq!(classify("   "), Intent::clarify(EMPTY_PROMPT, None));
        assert_eq!(classify("blorp zzz"), Intent::clarify(UNKNOWN_PROMPT, None));
    }

    fn context_after(meta: TurnMeta) -> TurnContext {
        let history = vec![Message::assistant("c1", "ok".into(), Vec::new(), meta)];
        TurnContext::from_history(&history, 20)
    }

    #[test]
    fn bare_reference_inherits_last_intent() {
        let ctx = context_after(TurnMeta {
            intent: Some(IntentKind::Complete),
            focus: Some(1),
            ..TurnMeta::default()
        });
        let intent = RuleClassifier::new().classify_text("the second one", &ctx);
        assert_eq!(
            intent,
            Intent::Complete {
                reference: "the second one".into()
            }
        );
    }

    #[test]
    fn bare_reference_without_history_clarifies() {
        assert_eq!(
            classify("the second one"),
            Intent::clarify(DANGLING_REFERENCE_PROMPT, None)
        );
    }

    #[test]
    fn pending_clarification_takes_whole_reply() {
        let ctx = context_after(TurnMeta {
            intent: Some(IntentKind::Clarify),
            pending: Some(IntentKind::Delete),
            ..TurnMeta::default()
        });
        assert_eq!(
            RuleClassifier::new().classify_text("the dentist one", &ctx),
            Intent::Delete {
                reference: "the dentist one".into()
            }
        );

        let ctx = context_after(TurnMeta {
            intent: Some(IntentKind::Clarify),
            pending: Some(IntentKind::Create),
            ..TurnMeta::default()
        });
        assert_eq!(
            RuleClassifier::new().classify_text("Buy stamps", &ctx),
            Intent::Create {
                title: "Buy stamps".into(),
                description: None
            }
        );
    }

    #[test]
    fn refusal_cancels_instead_of_targeting() {
        let ctx = context_after(TurnMeta {
            intent: Some(IntentKind::Delete),
            pending: Some(IntentKind::Delete),
            ..TurnMeta::default()
        });
        for reply in ["no", "No thanks", "never mind", "forget it", "cancel", "none of them"] {
            assert_eq!(
                RuleClassifier::new().classify_text(reply, &ctx),
                Intent::Cancel,
                "{reply}"
            );
        }
        assert_eq!(classify("nope"), Intent::Cancel);
        assert_eq!(
            classify("cancel the dentist appointment"),
            Intent::Delete {
                reference: "the dentist appointment".into()
            }
        );
    }

    #[test]
    fn update_follow_up_keeps_new_values() {
        let ctx = context_after(TurnMeta {
            intent: Some(IntentKind::Update),
            listed: Some(vec![2, 1]),
            pending: Some(IntentKind::Update),
            edit: Some(PendingEdit {
                title: Some("Standup".into()),
                description: None,
            }),
            ..TurnMeta::default()
        });
        let expected = Intent::Update {
            reference: "the first one".into(),
            title: Some("Standup".into()),
            description: None,
        };
        assert_eq!(RuleClassifier::new().classify_text("the first one", &ctx), expected);
    }

    struct Fixed(Intent);

    #[async_trait]
    impl Classifier for Fixed {
        async fn classify(&self, _: &str, _: &TurnContext) -> Result<Intent, AgentError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn fallback_only_runs_for_unrecognised_text() {
        let classifier = FallbackClassifier::new(Some(Arc::new(Fixed(Intent::Recall))));
        let ctx = TurnContext::default();

        let rules_hit = classifier.classify("show my tasks", &ctx).await.unwrap();
        assert_eq!(rules_hit.kind(), IntentKind::List);

        let fell_back = classifier.classify("blorp zzz", &ctx).await.unwrap();
        assert_eq!(fell_back, Intent::Recall);

        let targeted = classifier.classify("delete", &ctx).await.unwrap();
        assert_eq!(targeted.kind(), IntentKind::Clarify);
    }
}
