use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::types::StatusFilter;

/// Discriminant of [`Intent`], persisted in turn metadata.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum IntentKind {
    Create,
    List,
    Complete,
    Reopen,
    Delete,
    Update,
    Recall,
    Help,
    Cancel,
    Clarify,
}

impl IntentKind {
    /// Whether this kind needs a task reference to act on.
    pub fn takes_reference(self) -> bool {
        matches!(
            self,
            IntentKind::Complete | IntentKind::Reopen | IntentKind::Delete | IntentKind::Update
        )
    }
}

/// A classified utterance with its extracted slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    Create {
        title: String,
        description: Option<String>,
    },
    List {
        filter: StatusFilter,
    },
    Complete {
        reference: String,
    },
    Reopen {
        reference: String,
    },
    Delete {
        reference: String,
    },
    Update {
        reference: String,
        title: Option<String>,
        description: Option<String>,
    },
    Recall,
    Help,
    /// The user declined an open question; nothing changes.
    Cancel,
    Clarify {
        prompt: String,
        /// The intent waiting for the missing piece, if any.
        pending: Option<IntentKind>,
    },
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::Create { .. } => IntentKind::Create,
            Intent::List { .. } => IntentKind::List,
            Intent::Complete { .. } => IntentKind::Complete,
            Intent::Reopen { .. } => IntentKind::Reopen,
            Intent::Delete { .. } => IntentKind::Delete,
            Intent::Update { .. } => IntentKind::Update,
            Intent::Recall => IntentKind::Recall,
            Intent::Help => IntentKind::Help,
            Intent::Cancel => IntentKind::Cancel,
            Intent::Clarify { .. } => IntentKind::Clarify,
        }
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            Intent::Complete { reference }
            | Intent::Reopen { reference }
            | Intent::Delete { reference }
            | Intent::Update { reference, .. } => Some(reference),
            _ => None,
        }
    }

    pub fn clarify(prompt: impl Into<String>, pending: Option<IntentKind>) -> Self {
        Intent::Clarify {
            prompt: prompt.into(),
            pending,
        }
    }

    /// Rebuild a reference-taking intent around a new reference.
    ///
    /// Used when a bare follow-up ("the second one") inherits the kind of an
    /// earlier turn. Update follow-ups start with no field values; see
    /// [`Intent::with_edit`].
    pub fn with_reference(kind: IntentKind, reference: String) -> Option<Self> {
        match kind {
            IntentKind::Complete => Some(Intent::Complete { reference }),
            IntentKind::Reopen => Some(Intent::Reopen { reference }),
            IntentKind::Delete => Some(Intent::Delete { reference }),
            IntentKind::Update => Some(Intent::Update {
                reference,
                title: None,
                description: None,
            }),
            _ => None,
        }
    }

    /// Fill an update's empty fields from an edit left open by an earlier
    /// turn. Other intents pass through unchanged.
    pub fn with_edit(self, edit: Option<&PendingEdit>) -> Self {
        match (self, edit) {
            (
                Intent::Update {
                    reference,
                    title: None,
                    description: None,
                },
                Some(edit),
            ) => Intent::Update {
                reference,
                title: edit.title.clone(),
                description: edit.description.clone(),
            },
            (intent, _) => intent,
        }
    }
}

/// New field values of an update still waiting for its target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PendingEdit {
    /// The edit an update intent carries, if it changes anything.
    pub fn of(intent: &Intent) -> Option<Self> {
        match intent {
            Intent::Update {
                title, description, ..
            } if title.is_some() || description.is_some() => Some(Self {
                title: title.clone(),
                description: description.clone(),
            }),
            _ => None,
        }
    }
}
