//! Tracked item snapshot types.
//!
//! These mirror what an issue tracker exposes about an issue. The core
//! only reads them; every change goes through the tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Open/closed state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    #[default]
    Open,
    Closed,
}

/// Whether a label was added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelAction {
    Labeled,
    Unlabeled,
}

/// A label change in the item's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEvent {
    /// Added or removed.
    pub action: LabelAction,
    /// The label name.
    pub label: String,
    /// Account that made the change.
    pub actor: String,
    /// When the change happened.
    pub created_at: DateTime<Utc>,
}

impl LabelEvent {
    /// Create a label-added event.
    pub fn labeled(
        label: impl Into<String>,
        actor: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            action: LabelAction::Labeled,
            label: label.into(),
            actor: actor.into(),
            created_at,
        }
    }

    /// Create a label-removed event.
    pub fn unlabeled(
        label: impl Into<String>,
        actor: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            action: LabelAction::Unlabeled,
            ..Self::labeled(label, actor, created_at)
        }
    }
}

/// A comment on the item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Tracker-assigned comment ID.
    pub id: u64,
    /// Account that posted the comment.
    pub author: String,
    /// Raw comment text.
    pub body: String,
    /// When the comment was posted.
    pub created_at: DateTime<Utc>,
}

/// Snapshot of an issue as exposed by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    /// Issue number.
    pub number: u64,
    /// Issue title.
    #[serde(default)]
    pub title: String,
    /// Open or closed.
    #[serde(default)]
    pub state: ItemState,
    /// Pull requests are never managed.
    #[serde(default)]
    pub is_pull_request: bool,
    /// Current labels.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Assigned milestone title, if any.
    #[serde(default)]
    pub milestone: Option<String>,
    /// Issue author login.
    pub author: String,
    /// Assignee logins.
    #[serde(default)]
    pub assignees: Vec<String>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Label change history, oldest first.
    #[serde(default)]
    pub events: Vec<LabelEvent>,
    /// Comments, oldest first.
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl TrackedItem {
    /// Create an open issue with no labels, milestone or history.
    pub fn new(number: u64, author: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            number,
            title: String::new(),
            state: ItemState::Open,
            is_pull_request: false,
            labels: Vec::new(),
            milestone: None,
            author: author.into(),
            assignees: Vec::new(),
            updated_at,
            events: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Set the labels.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Set the milestone.
    pub fn with_milestone(mut self, milestone: impl Into<String>) -> Self {
        self.milestone = Some(milestone.into());
        self
    }

    /// Check if the item carries a label.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Check if the item is open.
    pub fn is_open(&self) -> bool {
        self.state == ItemState::Open
    }

    /// Sorted, de-duplicated logins of the author and assignees.
    pub fn participants(&self) -> Vec<String> {
        let mut users: Vec<String> = std::iter::once(&self.author)
            .chain(self.assignees.iter())
            .filter(|login| !login.is_empty())
            .cloned()
            .collect();
        users.sort();
        users.dedup();
        users
    }
}
