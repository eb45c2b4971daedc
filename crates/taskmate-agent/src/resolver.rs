//! Turns a free-text task reference into exactly one task.
//!
//! Resolution order, first hit wins:
//! 1. pronouns ("it", "that one") resolve to the context's focus task;
//! 2. explicit ids ("task 3", "#3", "3");
//! 3. ordinals ("the second one", "last") against the most recent listing,
//!    or creation order when nothing was listed;
//! 4. title matching: exact, then containment, then word overlap.
//!
//! Several equally good title matches yield [`AgentError::Ambiguous`]; the
//! resolver never guesses.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::context::TurnContext;
use crate::error::AgentError;
use crate::types::{Task, TaskId};

const MIN_OVERLAP: f64 = 0.5;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "task", "todo", "item", "called", "named", "titled", "about", "for", "to",
    "my", "that", "this", "one", "please", "can", "you", "complete", "finish", "delete", "remove",
    "mark", "done", "update", "edit", "change", "on", "list",
];

static PRONOUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:it|that|this|that\s+one|this\s+one|the\s+one|that\s+task|this\s+task|the\s+same\s+one|same\s+one|the\s+task)$",
    )
    .expect("pronoun pattern must compile")
});

static EXPLICIT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:the\s+)?(?:(?:task|item|todo|number|no\.?|id)\s*(?:#|:)?\s*|#)?(?P<id>\d+)$")
        .expect("id pattern must compile")
});

static ORDINAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:the\s+)?(?:very\s+)?(?P<o>first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth|last|latest|newest|oldest|most\s+recent|\d+(?:st|nd|rd|th))(?:\s+(?:one|task|item|todo))?(?:\s+(?:in|on|from)\s+(?:the|my)\s+list)?$",
    )
    .expect("ordinal pattern must compile")
});

/// Position an ordinal word refers to. `None` means "the final one".
fn ordinal_position(word: &str) -> Option<Option<usize>> {
    let position = match word {
        "first" | "oldest" => 0,
        "second" => 1,
        "third" => 2,
        "fourth" => 3,
        "fifth" => 4,
        "sixth" => 5,
        "seventh" => 6,
        "eighth" => 7,
        "ninth" => 8,
        "tenth" => 9,
        "last" | "latest" | "newest" => return Some(None),
        w if w.starts_with("most") => return Some(None),
        numeric => {
            let digits = numeric.trim_end_matches(|c: char| c.is_ascii_alphabetic());
            let n: usize = digits.parse().ok()?;
            n.checked_sub(1)?
        }
    };
    Some(Some(position))
}

fn normalise(reference: &str) -> String {
    reference
        .trim()
        .trim_matches(|c: char| ".,!?;:'\"".contains(c))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn significant_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Whether `needle` appears as a run of whole words inside `haystack`.
fn contains_words(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && needle.len() <= haystack.len()
        && haystack.windows(needle.len()).any(|run| run == needle)
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn ambiguous(reference: &str, candidates: Vec<&Task>) -> AgentError {
    AgentError::Ambiguous {
        reference: reference.to_owned(),
        candidates: candidates.into_iter().cloned().collect(),
    }
}

/// Keep only the candidates at the minimum of `key`; one survivor wins.
fn pick_unique<'a, K: PartialOrd + Copy>(
    reference: &str,
    candidates: Vec<(&'a Task, K)>,
) -> Result<&'a Task, AgentError> {
    let best = candidates
        .iter()
        .map(|(_, k)| *k)
        .fold(None, |acc: Option<K>, k| match acc {
            Some(a) if a <= k => Some(a),
            _ => Some(k),
        });
    let tied: Vec<&Task> = candidates
        .into_iter()
        .filter(|(_, k)| Some(*k) == best)
        .map(|(t, _)| t)
        .collect();
    match tied.len() {
        0 => Err(AgentError::NotFound(reference.to_owned())),
        1 => Ok(tied[0]),
        _ => Err(ambiguous(reference, tied)),
    }
}

/// Resolve `reference` against the owner's `tasks`.
///
/// `tasks` may be in any order; ordinals without a prior listing use
/// creation order, oldest first.
pub fn resolve(reference: &str, tasks: &[Task], ctx: &TurnContext) -> Result<Task, AgentError> {
    let text = normalise(reference);
    let not_found = || AgentError::NotFound(reference.trim().to_owned());
    if text.is_empty() {
        return Err(not_found());
    }

    if PRONOUN.is_match(&text) {
        debug!(reference = %text, focus = ?ctx.focus, "resolving pronoun");
        return ctx
            .focus
            .and_then(|id| tasks.iter().find(|t| t.id == id))
            .cloned()
            .ok_or_else(not_found);
    }

    if let Some(caps) = EXPLICIT_ID.captures(&text) {
        let id: Option<TaskId> = caps["id"].parse().ok();
        return id
            .and_then(|id| tasks.iter().find(|t| t.id == id))
            .cloned()
            .ok_or_else(not_found);
    }

    if let Some(caps) = ORDINAL.captures(&text) {
        let position = ordinal_position(&caps["o"]).ok_or_else(not_found)?;
        let sequence = ordinal_sequence(tasks, ctx);
        let picked = match position {
            Some(index) => sequence.get(index),
            None => sequence.last(),
        };
        return picked.map(|t| (*t).clone()).ok_or_else(not_found);
    }

    match_title(reference.trim(), &text, tasks).cloned()
}

/// Tasks in the order ordinals count over.
fn ordinal_sequence<'a>(tasks: &'a [Task], ctx: &TurnContext) -> Vec<&'a Task> {
    match &ctx.last_listing {
        Some(listed) => listed
            .iter()
            .filter_map(|id| tasks.iter().find(|t| t.id == *id))
            .collect(),
        None => {
            let mut by_age: Vec<&Task> = tasks.iter().collect();
            by_age.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            by_age
        }
    }
}

fn match_title<'a>(reference: &str, text: &str, tasks: &'a [Task]) -> Result<&'a Task, AgentError> {
    let query_words = significant_words(text);
    let query = query_words.join(" ");

    let exact: Vec<&Task> = tasks
        .iter()
        .filter(|t| {
            let title = t.title.to_lowercase();
            title == text || (!query.is_empty() && significant_words(&title).join(" ") == query)
        })
        .collect();
    match exact.len() {
        0 => {}
        1 => return Ok(exact[0]),
        _ => return Err(ambiguous(reference, exact)),
    }

    if query.is_empty() {
        return Err(AgentError::NotFound(reference.to_owned()));
    }

    let containing: Vec<(&Task, usize)> = tasks
        .iter()
        .filter_map(|t| {
            let title_words = significant_words(&t.title);
            let contains = contains_words(&title_words, &query_words)
                || contains_words(&query_words, &title_words);
            contains.then(|| (t, levenshtein(&query, &title_words.join(" "))))
        })
        .collect();
    if !containing.is_empty() {
        return pick_unique(reference, containing);
    }

    let query_set: HashSet<&str> = query_words.iter().map(String::as_str).collect();
    let overlapping: Vec<(&Task, (f64, usize))> = tasks
        .iter()
        .filter_map(|t| {
            let title_words = significant_words(&t.title);
            let title_set: HashSet<&str> = title_words.iter().map(String::as_str).collect();
            let score = jaccard(&query_set, &title_set);
            // Higher overlap first, then the closer spelling.
            (score >= MIN_OVERLAP).then(|| {
                let distance = levenshtein(&query, &title_words.join(" "));
                (t, (1.0 - score, distance))
            })
        })
        .collect();
    if overlapping.is_empty() {
        return Err(AgentError::NotFound(reference.to_owned()));
    }
    pick_unique(reference, overlapping)
}
