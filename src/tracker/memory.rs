//! In-memory issue tracker.
//!
//! Thread-safe implementation of [`IssueTracker`] over a
//! `RwLock<HashMap>`. Mutations are recorded as the configured actor and
//! journaled so tests can assert exactly what was changed. The file tracker
//! uses it as its working copy.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::core::item::{Comment, LabelEvent, TrackedItem};
use crate::error::{Result, StewardError};
use crate::tracker::IssueTracker;

/// Tracker operations, used for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerOp {
    Items,
    LabelEvents,
    LastModified,
    Comments,
    AddLabel,
    RemoveLabel,
    PostComment,
    DeleteComment,
    ClearMilestone,
}

/// A mutation applied through the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    AddLabel { number: u64, label: String },
    RemoveLabel { number: u64, label: String },
    PostComment { number: u64, id: u64 },
    DeleteComment { number: u64, id: u64 },
    ClearMilestone { number: u64 },
}

#[derive(Debug, Default)]
struct State {
    items: HashMap<u64, TrackedItem>,
    next_comment_id: u64,
    journal: Vec<Mutation>,
    failing: HashSet<TrackerOp>,
    clock: Option<DateTime<Utc>>,
}

/// In-memory issue tracker.
#[derive(Debug)]
pub struct MemoryTracker {
    actor: String,
    state: RwLock<State>,
}

impl MemoryTracker {
    /// Create an empty tracker acting as `actor`.
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            state: RwLock::new(State {
                next_comment_id: 1,
                ..State::default()
            }),
        }
    }

    /// Create a tracker holding the given items.
    pub fn with_items(actor: impl Into<String>, items: Vec<TrackedItem>) -> Result<Self> {
        let tracker = Self::new(actor);
        for item in items {
            tracker.insert(item)?;
        }
        Ok(tracker)
    }

    /// The account mutations are recorded as.
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Insert or replace an item.
    pub fn insert(&self, item: TrackedItem) -> Result<()> {
        let mut state = self.write()?;
        let max_id = item.comments.iter().map(|c| c.id).max().unwrap_or(0);
        state.next_comment_id = state.next_comment_id.max(max_id + 1);
        state.items.insert(item.number, item);
        Ok(())
    }

    /// Get a copy of an item.
    pub fn get(&self, number: u64) -> Result<Option<TrackedItem>> {
        Ok(self.read()?.items.get(&number).cloned())
    }

    /// Mutations applied so far, in order.
    pub fn mutations(&self) -> Result<Vec<Mutation>> {
        Ok(self.read()?.journal.clone())
    }

    /// Forget the recorded mutations.
    pub fn clear_mutations(&self) -> Result<()> {
        self.write()?.journal.clear();
        Ok(())
    }

    /// Make every subsequent call of `op` fail.
    pub fn fail_on(&self, op: TrackerOp) -> Result<()> {
        self.write()?.failing.insert(op);
        Ok(())
    }

    /// Stop failing `op`.
    pub fn recover(&self, op: TrackerOp) -> Result<()> {
        self.write()?.failing.remove(&op);
        Ok(())
    }

    /// Pin the time stamped on new events and comments.
    pub fn set_clock(&self, now: DateTime<Utc>) -> Result<()> {
        self.write()?.clock = Some(now);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StewardError::tracker("tracker state lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StewardError::tracker("tracker state lock poisoned"))
    }

    fn check(state: &State, op: TrackerOp) -> Result<()> {
        if state.failing.contains(&op) {
            return Err(StewardError::tracker(format!("injected failure: {:?}", op)));
        }
        Ok(())
    }

    fn with_item<R>(&self, op: TrackerOp, number: u64, f: impl FnOnce(&TrackedItem) -> R) -> Result<R> {
        let state = self.read()?;
        Self::check(&state, op)?;
        state
            .items
            .get(&number)
            .map(f)
            .ok_or_else(|| StewardError::tracker(format!("no such item #{}", number)))
    }

    fn mutate<R>(
        &self,
        op: TrackerOp,
        number: u64,
        f: impl FnOnce(&mut TrackedItem, DateTime<Utc>, &mut u64) -> Result<(R, Option<Mutation>)>,
    ) -> Result<R> {
        let mut state = self.write()?;
        Self::check(&state, op)?;
        let now = state.clock.unwrap_or_else(Utc::now);
        let mut next_id = state.next_comment_id;
        let item = state
            .items
            .get_mut(&number)
            .ok_or_else(|| StewardError::tracker(format!("no such item #{}", number)))?;
        let (result, mutation) = f(item, now, &mut next_id)?;
        state.next_comment_id = next_id;
        if let Some(mutation) = mutation {
            state.journal.push(mutation);
        }
        Ok(result)
    }
}

impl IssueTracker for MemoryTracker {
    fn items(&self) -> Result<Vec<TrackedItem>> {
        let state = self.read()?;
        Self::check(&state, TrackerOp::Items)?;
        let mut items: Vec<TrackedItem> = state.items.values().cloned().collect();
        items.sort_by_key(|item| item.number);
        Ok(items)
    }

    fn label_events(&self, number: u64) -> Result<Vec<LabelEvent>> {
        self.with_item(TrackerOp::LabelEvents, number, |item| item.events.clone())
    }

    fn last_modified(&self, number: u64) -> Result<DateTime<Utc>> {
        self.with_item(TrackerOp::LastModified, number, |item| item.updated_at)
    }

    fn comments(&self, number: u64) -> Result<Vec<Comment>> {
        self.with_item(TrackerOp::Comments, number, |item| item.comments.clone())
    }

    fn add_label(&self, number: u64, label: &str) -> Result<()> {
        let actor = self.actor.clone();
        self.mutate(TrackerOp::AddLabel, number, |item, now, _| {
            if item.has_label(label) {
                return Ok(((), None));
            }
            item.labels.push(label.to_string());
            item.events.push(LabelEvent::labeled(label, actor, now));
            Ok((
                (),
                Some(Mutation::AddLabel {
                    number,
                    label: label.to_string(),
                }),
            ))
        })
    }

    fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        let actor = self.actor.clone();
        self.mutate(TrackerOp::RemoveLabel, number, |item, now, _| {
            if !item.has_label(label) {
                return Ok(((), None));
            }
            item.labels.retain(|l| l != label);
            item.events.push(LabelEvent::unlabeled(label, actor, now));
            Ok((
                (),
                Some(Mutation::RemoveLabel {
                    number,
                    label: label.to_string(),
                }),
            ))
        })
    }

    fn post_comment(&self, number: u64, body: &str) -> Result<Comment> {
        let actor = self.actor.clone();
        self.mutate(TrackerOp::PostComment, number, |item, now, next_id| {
            let comment = Comment {
                id: *next_id,
                author: actor,
                body: body.to_string(),
                created_at: now,
            };
            *next_id += 1;
            item.comments.push(comment.clone());
            let mutation = Mutation::PostComment {
                number,
                id: comment.id,
            };
            Ok((comment, Some(mutation)))
        })
    }

    fn delete_comment(&self, number: u64, id: u64) -> Result<()> {
        self.mutate(TrackerOp::DeleteComment, number, |item, _, _| {
            let before = item.comments.len();
            item.comments.retain(|c| c.id != id);
            if item.comments.len() == before {
                return Err(StewardError::tracker(format!(
                    "no comment {} on item #{}",
                    id, number
                )));
            }
            Ok(((), Some(Mutation::DeleteComment { number, id })))
        })
    }

    fn clear_milestone(&self, number: u64) -> Result<()> {
        self.mutate(TrackerOp::ClearMilestone, number, |item, _, _| {
            if item.milestone.take().is_none() {
                return Ok(((), None));
            }
            Ok(((), Some(Mutation::ClearMilestone { number })))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::traits::tests::{fixture_item, fixture_time, test_issue_tracker_mutations};
    use std::sync::Arc;

    fn tracker() -> MemoryTracker {
        MemoryTracker::with_items("steward-bot", vec![fixture_item(1)]).unwrap()
    }

    #[test]
    fn test_memory_tracker_mutations() {
        let tracker = tracker();
        test_issue_tracker_mutations(&tracker, "steward-bot");
    }

    #[test]
    fn test_arc_tracker_mutations() {
        let tracker = Arc::new(tracker());
        test_issue_tracker_mutations(&tracker, "steward-bot");
    }

    #[test]
    fn test_items_sorted_by_number() {
        let tracker = MemoryTracker::with_items(
            "bot",
            vec![fixture_item(3), fixture_item(1), fixture_item(2)],
        )
        .unwrap();

        let numbers: Vec<u64> = tracker.items().unwrap().iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_journal_skips_no_ops() {
        let tracker = tracker();
        tracker.remove_label(1, "kind/bug").unwrap();
        tracker.add_label(1, "kind/bug").unwrap();
        tracker.add_label(1, "kind/bug").unwrap();

        assert_eq!(
            tracker.mutations().unwrap(),
            vec![Mutation::AddLabel {
                number: 1,
                label: "kind/bug".to_string()
            }]
        );

        tracker.clear_mutations().unwrap();
        assert!(tracker.mutations().unwrap().is_empty());
    }

    #[test]
    fn test_clock_stamps_events_and_comments() {
        let tracker = tracker();
        tracker.set_clock(fixture_time()).unwrap();

        tracker.add_label(1, "milestone/removed").unwrap();
        let comment = tracker.post_comment(1, "body").unwrap();

        assert_eq!(comment.created_at, fixture_time());
        assert_eq!(
            tracker
                .label_last_applied(1, "milestone/removed", "steward-bot")
                .unwrap(),
            Some(fixture_time())
        );
    }

    #[test]
    fn test_label_last_applied_picks_latest() {
        let mut item = fixture_item(1);
        item.events = vec![
            LabelEvent::labeled("milestone/needs-approval", "bot", fixture_time()),
            LabelEvent::unlabeled(
                "milestone/needs-approval",
                "bot",
                fixture_time() + chrono::Duration::hours(1),
            ),
            LabelEvent::labeled(
                "milestone/needs-approval",
                "bot",
                fixture_time() + chrono::Duration::hours(2),
            ),
            LabelEvent::labeled(
                "milestone/needs-approval",
                "human",
                fixture_time() + chrono::Duration::hours(3),
            ),
        ];
        let tracker = MemoryTracker::with_items("bot", vec![item]).unwrap();

        assert_eq!(
            tracker
                .label_last_applied(1, "milestone/needs-approval", "bot")
                .unwrap(),
            Some(fixture_time() + chrono::Duration::hours(2))
        );
    }

    #[test]
    fn test_comment_ids_continue_after_existing() {
        let mut item = fixture_item(1);
        item.comments.push(Comment {
            id: 41,
            author: "alice".to_string(),
            body: "hi".to_string(),
            created_at: fixture_time(),
        });
        let tracker = MemoryTracker::with_items("bot", vec![item]).unwrap();

        assert_eq!(tracker.post_comment(1, "next").unwrap().id, 42);
    }

    #[test]
    fn test_failure_injection() {
        let tracker = tracker();
        tracker.fail_on(TrackerOp::PostComment).unwrap();

        let err = tracker.post_comment(1, "body").unwrap_err();
        assert!(err.to_string().contains("PostComment"));
        assert!(tracker.comments(1).unwrap().is_empty());

        tracker.recover(TrackerOp::PostComment).unwrap();
        assert!(tracker.post_comment(1, "body").is_ok());
    }

    #[test]
    fn test_last_modified_ignores_bot_activity() {
        let tracker = tracker();
        tracker.add_label(1, "milestone/needs-attention").unwrap();
        tracker.post_comment(1, "ping").unwrap();

        assert_eq!(tracker.last_modified(1).unwrap(), fixture_time());
    }
}
