//! Issue tracker trait.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::item::{Comment, LabelAction, LabelEvent, TrackedItem};
use crate::error::Result;

/// Operations the maintainer needs from an issue tracker.
///
/// Every call is fallible. A failed read of history makes the affected
/// item indeterminate for the cycle; a failed mutation aborts the remaining
/// steps for that item.
pub trait IssueTracker: Send + Sync {
    /// List every item known to the tracker, ordered by number.
    fn items(&self) -> Result<Vec<TrackedItem>>;

    /// Label change history of an item, oldest first.
    fn label_events(&self, number: u64) -> Result<Vec<LabelEvent>>;

    /// Most recent time `actor` applied `label` to the item.
    ///
    /// Returns `Ok(None)` when no such event exists.
    fn label_last_applied(
        &self,
        number: u64,
        label: &str,
        actor: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .label_events(number)?
            .into_iter()
            .filter(|e| e.action == LabelAction::Labeled && e.label == label && e.actor == actor)
            .map(|e| e.created_at)
            .max())
    }

    /// Last time the item was modified.
    fn last_modified(&self, number: u64) -> Result<DateTime<Utc>>;

    /// Comments on the item, oldest first.
    fn comments(&self, number: u64) -> Result<Vec<Comment>>;

    /// Add a label. Adding a label already present is a no-op.
    fn add_label(&self, number: u64, label: &str) -> Result<()>;

    /// Remove a label. Removing a missing label is a no-op.
    fn remove_label(&self, number: u64, label: &str) -> Result<()>;

    /// Post a comment and return it as stored.
    fn post_comment(&self, number: u64, body: &str) -> Result<Comment>;

    /// Delete a comment by ID.
    fn delete_comment(&self, number: u64, id: u64) -> Result<()>;

    /// Clear the item's milestone.
    fn clear_milestone(&self, number: u64) -> Result<()>;

    /// Persist buffered changes. Trackers that write through do nothing.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Blanket implementation of IssueTracker for Arc-wrapped trackers.
impl<T: IssueTracker + ?Sized> IssueTracker for Arc<T> {
    fn items(&self) -> Result<Vec<TrackedItem>> {
        (**self).items()
    }

    fn label_events(&self, number: u64) -> Result<Vec<LabelEvent>> {
        (**self).label_events(number)
    }

    fn label_last_applied(
        &self,
        number: u64,
        label: &str,
        actor: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        (**self).label_last_applied(number, label, actor)
    }

    fn last_modified(&self, number: u64) -> Result<DateTime<Utc>> {
        (**self).last_modified(number)
    }

    fn comments(&self, number: u64) -> Result<Vec<Comment>> {
        (**self).comments(number)
    }

    fn add_label(&self, number: u64, label: &str) -> Result<()> {
        (**self).add_label(number, label)
    }

    fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        (**self).remove_label(number, label)
    }

    fn post_comment(&self, number: u64, body: &str) -> Result<Comment> {
        (**self).post_comment(number, body)
    }

    fn delete_comment(&self, number: u64, id: u64) -> Result<()> {
        (**self).delete_comment(number, id)
    }

    fn clear_milestone(&self, number: u64) -> Result<()> {
        (**self).clear_milestone(number)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}
