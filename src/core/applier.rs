//! Applies a resolution to the issue tracker.
//!
//! Steps run in order and stop at the first failure: sync the state
//! label, replace the notification if it is stale, then clear the
//! milestone. Nothing is rolled back; the next evaluation picks up where
//! this one stopped.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::core::item::{Comment, TrackedItem};
use crate::core::labels::STATE_LABELS;
use crate::core::notification::{Notification, NOTIFIER_NAME};
use crate::core::resolver::Resolution;
use crate::error::{Result, StewardError};
use crate::tracker::IssueTracker;

/// Mutations performed for one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliedChanges {
    /// State labels added.
    pub labels_added: Vec<String>,
    /// State labels removed.
    pub labels_removed: Vec<String>,
    /// ID of the stale notification deleted.
    pub comment_deleted: Option<u64>,
    /// ID of the notification posted.
    pub comment_posted: Option<u64>,
    /// Whether the milestone was cleared.
    pub milestone_cleared: bool,
}

impl AppliedChanges {
    /// Check if nothing was changed.
    pub fn is_empty(&self) -> bool {
        self.labels_added.is_empty()
            && self.labels_removed.is_empty()
            && self.comment_deleted.is_none()
            && self.comment_posted.is_none()
            && !self.milestone_cleared
    }
}

/// Check if a previously posted notification can stay.
///
/// It can when it is identical to the new one and, if the state repeats
/// its warning, it is younger than the repeat interval.
pub fn notification_is_current(
    new: &Notification,
    prior: Option<(&Notification, DateTime<Utc>)>,
    repeat_interval: Option<Duration>,
    now: DateTime<Utc>,
) -> bool {
    let Some((prior, posted_at)) = prior else {
        return false;
    };
    if prior != new {
        return false;
    }
    match repeat_interval {
        None => true,
        Some(interval) => now.signed_duration_since(posted_at) < interval,
    }
}

/// Applies resolutions through an issue tracker.
pub struct ChangeApplier<'a, T: IssueTracker + ?Sized> {
    tracker: &'a T,
    bot_name: &'a str,
}

impl<'a, T: IssueTracker + ?Sized> ChangeApplier<'a, T> {
    /// Create an applier acting as `bot_name`.
    pub fn new(tracker: &'a T, bot_name: &'a str) -> Self {
        Self { tracker, bot_name }
    }

    /// Bring the item in line with the resolution.
    ///
    /// On error, the changes made before the failing step stay in place.
    pub fn apply(
        &self,
        item: &TrackedItem,
        resolution: &Resolution,
        now: DateTime<Utc>,
    ) -> Result<AppliedChanges> {
        let mut changes = AppliedChanges::default();

        // Comment history is read before anything is mutated
        let prior = self.latest_notification(item.number)?;

        self.sync_labels(item, resolution.label, &mut changes)?;

        let is_current = notification_is_current(
            &resolution.notification,
            prior.as_ref().map(|(c, n)| (n, c.created_at)),
            resolution.repeat_interval,
            now,
        );
        if !is_current {
            if let Some((comment, _)) = &prior {
                self.tracker.delete_comment(item.number, comment.id)?;
                changes.comment_deleted = Some(comment.id);
            }
            let posted = self
                .tracker
                .post_comment(item.number, &resolution.notification.to_comment())?;
            tracing::info!(
                item = item.number,
                state = %resolution.state,
                comment = posted.id,
                "posted notification"
            );
            changes.comment_posted = Some(posted.id);
        }

        if resolution.remove_from_milestone {
            self.tracker.clear_milestone(item.number)?;
            tracing::info!(item = item.number, "removed from milestone");
            changes.milestone_cleared = true;
        }

        Ok(changes)
    }

    /// Apply the state label and remove every other state label.
    fn sync_labels(
        &self,
        item: &TrackedItem,
        label: Option<&str>,
        changes: &mut AppliedChanges,
    ) -> Result<()> {
        if let Some(label) = label {
            if !item.has_label(label) {
                self.tracker.add_label(item.number, label)?;
                tracing::info!(item = item.number, label, "added state label");
                changes.labels_added.push(label.to_string());
            }
        }

        for stale in STATE_LABELS
            .iter()
            .filter(|l| Some(**l) != label && item.has_label(l))
        {
            self.tracker.remove_label(item.number, stale)?;
            tracing::info!(item = item.number, label = *stale, "removed state label");
            changes.labels_removed.push(stale.to_string());
        }

        Ok(())
    }

    /// The most recent notification the bot posted on the item.
    ///
    /// An unreadable comment history makes the item indeterminate.
    fn latest_notification(&self, number: u64) -> Result<Option<(Comment, Notification)>> {
        let comments = self.tracker.comments(number).map_err(|e| {
            StewardError::indeterminate(format!("#{}: comments unavailable: {}", number, e))
        })?;
        Ok(comments
            .into_iter()
            .filter(|c| c.author == self.bot_name)
            .filter_map(|c| {
                let notification = Notification::parse(&c.body)?;
                notification.is_from(NOTIFIER_NAME).then_some((c, notification))
            })
            .last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::item::LabelEvent;
    use crate::core::labels::{NEEDS_APPROVAL_LABEL, REMOVED_LABEL};
    use crate::core::resolver::Resolver;
    use crate::core::state::{LifecycleState, MilestoneMode};
    use crate::tracker::{MemoryTracker, Mutation, TrackerOp};
    use chrono::TimeZone;

    const BOT: &str = "steward-bot";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 11, 20, 12, 0, 0).unwrap()
    }

    fn config(mode: MilestoneMode) -> Config {
        let mut config = Config::default();
        config.milestone.active_milestone = "v1.9".to_string();
        config.milestone.mode = mode;
        config.milestone.freeze_date = "Nov 22".to_string();
        config.bot.name = BOT.to_string();
        config
    }

    fn item(labels: &[&str]) -> TrackedItem {
        TrackedItem::new(7, "alice", now())
            .with_labels(labels.iter().copied())
            .with_milestone("v1.9")
    }

    fn comment(id: u64, author: &str, body: &str, at: DateTime<Utc>) -> Comment {
        Comment {
            id,
            author: author.to_string(),
            body: body.to_string(),
            created_at: at,
        }
    }

    /// Resolve and apply one cycle against the tracker's current copy.
    fn cycle(tracker: &MemoryTracker, config: &Config, at: DateTime<Utc>) -> Result<AppliedChanges> {
        tracker.set_clock(at).unwrap();
        let item = tracker.get(7).unwrap().unwrap();
        let resolution = Resolver::new(config).resolve(tracker, &item, at)?;
        ChangeApplier::new(tracker, BOT).apply(&item, &resolution, at)
    }

    // =========================================================================
    // notification_is_current
    // =========================================================================

    #[test]
    fn test_no_prior_is_not_current() {
        let n = Notification::new(NOTIFIER_NAME, "t", "b");
        assert!(!notification_is_current(&n, None, None, now()));
    }

    #[test]
    fn test_identical_prior_without_interval_is_current() {
        let n = Notification::new(NOTIFIER_NAME, "t", "b");
        let posted = now() - Duration::days(365);
        assert!(notification_is_current(&n, Some((&n, posted)), None, now()));
    }

    #[test]
    fn test_different_prior_is_not_current() {
        let new = Notification::new(NOTIFIER_NAME, "t", "b");
        let old = Notification::new(NOTIFIER_NAME, "t", "c");
        assert!(!notification_is_current(&new, Some((&old, now())), None, now()));
    }

    #[test]
    fn test_identical_prior_expires_with_interval() {
        let n = Notification::new(NOTIFIER_NAME, "t", "b");
        let interval = Some(Duration::hours(24));

        let fresh = now() - Duration::hours(23);
        assert!(notification_is_current(&n, Some((&n, fresh)), interval, now()));

        let due = now() - Duration::hours(24);
        assert!(!notification_is_current(&n, Some((&n, due)), interval, now()));
    }

    // =========================================================================
    // apply
    // =========================================================================

    #[test]
    fn test_first_cycle_labels_and_posts() {
        let config = config(MilestoneMode::Dev);
        let tracker = MemoryTracker::with_items(BOT, vec![item(&["sig/api"])]).unwrap();

        let changes = cycle(&tracker, &config, now()).unwrap();

        assert_eq!(changes.labels_added, vec!["milestone/incomplete-labels"]);
        assert!(changes.labels_removed.is_empty());
        assert_eq!(changes.comment_deleted, None);
        assert!(changes.comment_posted.is_some());
        assert!(!changes.milestone_cleared);

        let stored = tracker.get(7).unwrap().unwrap();
        let posted = Notification::parse(&stored.comments[0].body).unwrap();
        assert_eq!(posted.title(), "Milestone Labels **Incomplete**");
    }

    #[test]
    fn test_unchanged_re_evaluation_makes_no_mutations() {
        let config = config(MilestoneMode::Dev);
        let tracker = MemoryTracker::with_items(BOT, vec![item(&["sig/api"])]).unwrap();

        cycle(&tracker, &config, now()).unwrap();
        tracker.clear_mutations().unwrap();

        let changes = cycle(&tracker, &config, now()).unwrap();
        assert!(changes.is_empty());
        assert!(tracker.mutations().unwrap().is_empty());
    }

    #[test]
    fn test_warning_is_reposted_after_interval() {
        let config = config(MilestoneMode::Dev);
        let tracker = MemoryTracker::with_items(BOT, vec![item(&["sig/api"])]).unwrap();

        let first = cycle(&tracker, &config, now()).unwrap();
        let later = now() + Duration::hours(25);
        let second = cycle(&tracker, &config, later).unwrap();

        assert_eq!(second.comment_deleted, first.comment_posted);
        assert!(second.comment_posted.is_some());
        assert!(second.labels_added.is_empty());

        let stored = tracker.get(7).unwrap().unwrap();
        assert_eq!(stored.comments.len(), 1);
        // Grace is measured from the original label application
        assert!(stored.comments[0].body.contains("within 1d"));
    }

    #[test]
    fn test_current_notification_is_not_repeated() {
        let config = config(MilestoneMode::Dev);
        let tracker = MemoryTracker::with_items(
            BOT,
            vec![item(&[
                "kind/bug",
                "priority/important-soon",
                "sig/api",
                "status/approved-for-milestone",
            ])],
        )
        .unwrap();

        let first = cycle(&tracker, &config, now()).unwrap();
        assert!(first.comment_posted.is_some());

        let much_later = cycle(&tracker, &config, now() + Duration::days(30)).unwrap();
        assert!(much_later.is_empty());
    }

    #[test]
    fn test_unapproved_removal_scenario() {
        let config = config(MilestoneMode::Dev);
        let mut issue = item(&[
            "kind/bug",
            "priority/important-soon",
            "sig/api",
            NEEDS_APPROVAL_LABEL,
        ]);
        issue.events.push(LabelEvent::labeled(
            NEEDS_APPROVAL_LABEL,
            BOT,
            now() - Duration::hours(200),
        ));
        let tracker = MemoryTracker::with_items(BOT, vec![issue]).unwrap();

        let changes = cycle(&tracker, &config, now()).unwrap();

        assert_eq!(changes.labels_added, vec![REMOVED_LABEL]);
        assert_eq!(changes.labels_removed, vec![NEEDS_APPROVAL_LABEL]);
        assert!(changes.milestone_cleared);

        let stored = tracker.get(7).unwrap().unwrap();
        assert_eq!(stored.labels.last().map(String::as_str), Some(REMOVED_LABEL));
        assert!(!stored.has_label(NEEDS_APPROVAL_LABEL));
        assert!(stored.milestone.is_none());

        // Milestone is cleared last
        let mutations = tracker.mutations().unwrap();
        assert_eq!(mutations.last(), Some(&Mutation::ClearMilestone { number: 7 }));
    }

    #[test]
    fn test_only_latest_bot_notification_is_replaced() {
        let config = config(MilestoneMode::Dev);
        let mut issue = item(&["sig/api"]);
        let old = now() - Duration::hours(1);
        issue.comments = vec![
            comment(1, BOT, "[MILESTONENOTIFIER] old\n\nfirst", old),
            comment(2, "alice", "[MILESTONENOTIFIER] spoofed\n\nnot the bot", old),
            comment(3, BOT, "[OTHER] unrelated\n\nbody", old),
            comment(4, BOT, "[MILESTONENOTIFIER] old\n\nsecond", old),
            comment(5, BOT, "plain text", old),
        ];
        let tracker = MemoryTracker::with_items(BOT, vec![issue]).unwrap();

        let changes = cycle(&tracker, &config, now()).unwrap();

        assert_eq!(changes.comment_deleted, Some(4));
        let ids: Vec<u64> = tracker
            .get(7)
            .unwrap()
            .unwrap()
            .comments
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 5, 6]);
    }

    #[test]
    fn test_state_change_replaces_labels() {
        let config = config(MilestoneMode::Dev);
        let mut issue = item(&[
            "kind/bug",
            "priority/important-soon",
            "sig/api",
            "status/approved-for-milestone",
            "milestone/incomplete-labels",
            "milestone/needs-attention",
        ]);
        issue.events.push(LabelEvent::labeled(
            "milestone/incomplete-labels",
            BOT,
            now() - Duration::hours(1),
        ));
        let tracker = MemoryTracker::with_items(BOT, vec![issue]).unwrap();

        let changes = cycle(&tracker, &config, now()).unwrap();

        assert!(changes.labels_added.is_empty());
        assert_eq!(
            changes.labels_removed,
            vec!["milestone/incomplete-labels", "milestone/needs-attention"]
        );
    }

    #[test]
    fn test_label_failure_aborts_before_comment() {
        let config = config(MilestoneMode::Dev);
        let tracker = MemoryTracker::with_items(BOT, vec![item(&["sig/api"])]).unwrap();
        tracker.fail_on(TrackerOp::AddLabel).unwrap();

        assert!(cycle(&tracker, &config, now()).is_err());
        assert!(tracker.mutations().unwrap().is_empty());
    }

    #[test]
    fn test_comment_fetch_failure_is_indeterminate_without_mutations() {
        let config = config(MilestoneMode::Dev);
        let tracker = MemoryTracker::with_items(BOT, vec![item(&["sig/api"])]).unwrap();
        tracker.fail_on(TrackerOp::Comments).unwrap();

        let err = cycle(&tracker, &config, now()).unwrap_err();
        assert!(err.is_indeterminate());
        assert!(tracker.mutations().unwrap().is_empty());
    }

    #[test]
    fn test_post_failure_keeps_milestone() {
        let config = config(MilestoneMode::Freeze);
        let tracker = MemoryTracker::with_items(
            BOT,
            vec![item(&[
                "kind/bug",
                "priority/important-soon",
                "sig/api",
                "status/approved-for-milestone",
            ])],
        )
        .unwrap();
        tracker.fail_on(TrackerOp::PostComment).unwrap();

        assert!(cycle(&tracker, &config, now()).is_err());

        let stored = tracker.get(7).unwrap().unwrap();
        // Label step already happened and is not rolled back
        assert!(stored.has_label(REMOVED_LABEL));
        assert_eq!(stored.milestone.as_deref(), Some("v1.9"));

        // Next cycle completes the removal
        tracker.recover(TrackerOp::PostComment).unwrap();
        let changes = cycle(&tracker, &config, now()).unwrap();
        assert!(changes.labels_added.is_empty());
        assert!(changes.comment_posted.is_some());
        assert!(changes.milestone_cleared);
    }

    #[test]
    fn test_resolution_state_drives_label() {
        let config = config(MilestoneMode::Dev);
        let issue = item(&["sig/api"]);
        let tracker = MemoryTracker::with_items(BOT, vec![issue.clone()]).unwrap();
        let resolution = Resolver::new(&config)
            .resolve(&tracker, &issue, now())
            .unwrap();

        assert_eq!(resolution.state, LifecycleState::NeedsLabeling);
        let changes = ChangeApplier::new(&tracker, BOT)
            .apply(&issue, &resolution, now())
            .unwrap();
        assert_eq!(changes.labels_added, vec![resolution.label.unwrap()]);
    }
}
