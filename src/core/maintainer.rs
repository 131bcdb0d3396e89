//! Milestone maintenance driver.
//!
//! Walks every item the tracker knows about, resolves its lifecycle state
//! and, in apply mode, brings labels, comments and milestone in line.
//! Items are processed one at a time; a failure on one item never stops
//! the others.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::core::applier::{AppliedChanges, ChangeApplier};
use crate::core::item::TrackedItem;
use crate::core::resolver::Resolver;
use crate::core::state::LifecycleState;
use crate::error::Result;
use crate::tracker::IssueTracker;

/// Whether resolutions are applied or only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Resolve only; the tracker is not mutated.
    Check,
    /// Resolve and apply.
    Apply,
}

/// What happened to one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Not subject to enforcement (pull request, closed, other milestone).
    Ignored,
    /// History could not be established; retried next cycle.
    Skipped { reason: String },
    /// Resolved in check mode.
    Planned {
        state: LifecycleState,
        label: Option<&'static str>,
        remove_from_milestone: bool,
        notification: String,
    },
    /// Resolved and applied.
    Applied {
        state: LifecycleState,
        changes: AppliedChanges,
    },
    /// A tracker call failed; earlier changes for this item stay in place.
    Failed { error: String },
}

impl ItemOutcome {
    /// Resolved state, if any.
    pub fn state(&self) -> Option<LifecycleState> {
        match self {
            Self::Planned { state, .. } | Self::Applied { state, .. } => Some(*state),
            _ => None,
        }
    }
}

/// Per-item result of a maintenance run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub number: u64,
    pub title: String,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

/// Runs milestone maintenance over a tracker.
pub struct Maintainer<'a, T: IssueTracker + ?Sized> {
    config: &'a Config,
    tracker: &'a T,
}

impl<'a, T: IssueTracker + ?Sized> Maintainer<'a, T> {
    /// Create a maintainer for the given configuration and tracker.
    pub fn new(config: &'a Config, tracker: &'a T) -> Self {
        Self { config, tracker }
    }

    /// Process every item once.
    ///
    /// Fails before touching any item if the configuration is invalid or
    /// the item list cannot be fetched. Per-item failures are reported in
    /// the returned outcomes instead.
    pub fn run(&self, mode: RunMode, now: DateTime<Utc>) -> Result<Vec<ItemReport>> {
        self.config.validate()?;

        let resolver = Resolver::new(self.config);
        let items = self.tracker.items()?;

        Ok(items
            .iter()
            .map(|item| ItemReport {
                number: item.number,
                title: item.title.clone(),
                outcome: self.process(&resolver, item, mode, now),
            })
            .collect())
    }

    fn process(
        &self,
        resolver: &Resolver<'_>,
        item: &TrackedItem,
        mode: RunMode,
        now: DateTime<Utc>,
    ) -> ItemOutcome {
        if !resolver.applies_to(item) {
            return ItemOutcome::Ignored;
        }

        let resolution = match resolver.resolve(self.tracker, item, now) {
            Ok(resolution) => resolution,
            Err(e) if e.is_indeterminate() => {
                tracing::debug!(item = item.number, reason = %e, "skipping item");
                return ItemOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
            Err(e) => {
                tracing::warn!(item = item.number, error = %e, "failed to resolve item");
                return ItemOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        match mode {
            RunMode::Check => ItemOutcome::Planned {
                state: resolution.state,
                label: resolution.label,
                remove_from_milestone: resolution.remove_from_milestone,
                notification: resolution.notification.title().to_string(),
            },
            RunMode::Apply => {
                let applier = ChangeApplier::new(self.tracker, &self.config.bot.name);
                match applier.apply(item, &resolution, now) {
                    Ok(changes) => {
                        if !changes.is_empty() {
                            tracing::info!(
                                item = item.number,
                                state = %resolution.state,
                                "item updated"
                            );
                        }
                        ItemOutcome::Applied {
                            state: resolution.state,
                            changes,
                        }
                    }
                    Err(e) if e.is_indeterminate() => {
                        tracing::debug!(item = item.number, reason = %e, "skipping item");
                        ItemOutcome::Skipped {
                            reason: e.to_string(),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            item = item.number,
                            state = %resolution.state,
                            error = %e,
                            "failed to apply changes"
                        );
                        ItemOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::{ItemState, LabelEvent};
    use crate::core::labels::{LABELS_INCOMPLETE_LABEL, NEEDS_APPROVAL_LABEL, REMOVED_LABEL};
    use crate::core::state::MilestoneMode;
    use crate::error::StewardError;
    use crate::tracker::{MemoryTracker, Mutation, TrackerOp};
    use chrono::{Duration, TimeZone};

    const BOT: &str = "steward-bot";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 11, 20, 12, 0, 0).unwrap()
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.milestone.active_milestone = "v1.9".to_string();
        config.milestone.mode = MilestoneMode::Dev;
        config.bot.name = BOT.to_string();
        config
    }

    fn issue(number: u64, labels: &[&str]) -> TrackedItem {
        let mut item = TrackedItem::new(number, "alice", now())
            .with_labels(labels.iter().copied())
            .with_milestone("v1.9");
        item.title = format!("Issue {}", number);
        item
    }

    fn outcome_for(reports: &[ItemReport], number: u64) -> &ItemOutcome {
        &reports
            .iter()
            .find(|r| r.number == number)
            .expect("report for item")
            .outcome
    }

    /// Tracker with one item of each kind the driver distinguishes.
    fn mixed_tracker() -> MemoryTracker {
        let mut pull = issue(1, &[]);
        pull.is_pull_request = true;

        let mut closed = issue(2, &[]);
        closed.state = ItemState::Closed;

        let elsewhere = issue(3, &[]).with_milestone("v1.10");

        let incomplete = issue(4, &["sig/api"]);

        // State label present but never applied by the bot
        let indeterminate = issue(
            5,
            &[
                "kind/bug",
                "priority/important-soon",
                "sig/api",
                NEEDS_APPROVAL_LABEL,
            ],
        );

        tracker_with(vec![pull, closed, elsewhere, incomplete, indeterminate])
    }

    fn tracker_with(items: Vec<TrackedItem>) -> MemoryTracker {
        let tracker = MemoryTracker::with_items(BOT, items).unwrap();
        tracker.set_clock(now()).unwrap();
        tracker
    }

    // =========================================================================
    // Check mode
    // =========================================================================

    #[test]
    fn test_check_mode_classifies_items() {
        let config = config();
        let tracker = mixed_tracker();

        let reports = Maintainer::new(&config, &tracker)
            .run(RunMode::Check, now())
            .unwrap();

        assert_eq!(reports.len(), 5);
        assert_eq!(outcome_for(&reports, 1), &ItemOutcome::Ignored);
        assert_eq!(outcome_for(&reports, 2), &ItemOutcome::Ignored);
        assert_eq!(outcome_for(&reports, 3), &ItemOutcome::Ignored);
        assert!(matches!(
            outcome_for(&reports, 4),
            ItemOutcome::Planned {
                state: LifecycleState::NeedsLabeling,
                label: Some(LABELS_INCOMPLETE_LABEL),
                remove_from_milestone: false,
                ..
            }
        ));
        assert!(matches!(
            outcome_for(&reports, 5),
            ItemOutcome::Skipped { .. }
        ));
    }

    #[test]
    fn test_check_mode_does_not_mutate() {
        let config = config();
        let tracker = mixed_tracker();

        Maintainer::new(&config, &tracker)
            .run(RunMode::Check, now())
            .unwrap();

        assert!(tracker.mutations().unwrap().is_empty());
    }

    // =========================================================================
    // Apply mode
    // =========================================================================

    #[test]
    fn test_apply_mode_updates_applicable_items_only() {
        let config = config();
        let tracker = mixed_tracker();

        let reports = Maintainer::new(&config, &tracker)
            .run(RunMode::Apply, now())
            .unwrap();

        match outcome_for(&reports, 4) {
            ItemOutcome::Applied { state, changes } => {
                assert_eq!(*state, LifecycleState::NeedsLabeling);
                assert_eq!(changes.labels_added, vec![LABELS_INCOMPLETE_LABEL]);
                assert!(changes.comment_posted.is_some());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let mutated: Vec<u64> = tracker
            .mutations()
            .unwrap()
            .iter()
            .map(|m| match m {
                Mutation::AddLabel { number, .. }
                | Mutation::RemoveLabel { number, .. }
                | Mutation::PostComment { number, .. }
                | Mutation::DeleteComment { number, .. }
                | Mutation::ClearMilestone { number } => *number,
            })
            .collect();
        assert!(mutated.iter().all(|n| *n == 4));
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let config = config();
        let tracker = mixed_tracker();
        let maintainer = Maintainer::new(&config, &tracker);

        maintainer.run(RunMode::Apply, now()).unwrap();
        tracker.clear_mutations().unwrap();

        let reports = maintainer.run(RunMode::Apply, now()).unwrap();
        assert!(tracker.mutations().unwrap().is_empty());
        assert!(matches!(
            outcome_for(&reports, 4),
            ItemOutcome::Applied { changes, .. } if changes.is_empty()
        ));
    }

    #[test]
    fn test_removal_clears_milestone() {
        let config = config();
        let mut expired = issue(9, &["kind/bug", "priority/important-soon", "sig/api"]);
        expired.labels.push(NEEDS_APPROVAL_LABEL.to_string());
        expired.events.push(LabelEvent::labeled(
            NEEDS_APPROVAL_LABEL,
            BOT,
            now() - Duration::days(8),
        ));
        let tracker = tracker_with(vec![expired]);

        let reports = Maintainer::new(&config, &tracker)
            .run(RunMode::Apply, now())
            .unwrap();

        assert_eq!(reports[0].outcome.state(), Some(LifecycleState::NeedsRemoval));
        let stored = tracker.get(9).unwrap().unwrap();
        assert!(stored.milestone.is_none());
        assert!(stored.has_label(REMOVED_LABEL));
    }

    #[test]
    fn test_failure_is_reported_and_others_continue() {
        let config = config();
        let tracker = tracker_with(vec![issue(4, &["sig/api"]), issue(6, &["sig/api"])]);
        tracker.fail_on(TrackerOp::PostComment).unwrap();

        let reports = Maintainer::new(&config, &tracker)
            .run(RunMode::Apply, now())
            .unwrap();

        assert_eq!(reports.len(), 2);
        for report in &reports {
            assert!(matches!(report.outcome, ItemOutcome::Failed { .. }));
        }

        // Label sync ran before the failing post and is not rolled back
        assert!(tracker
            .get(6)
            .unwrap()
            .unwrap()
            .has_label(LABELS_INCOMPLETE_LABEL));
    }

    #[test]
    fn test_unreadable_comments_skip_item_without_mutations() {
        let config = config();
        let tracker = tracker_with(vec![issue(4, &["sig/api"])]);
        tracker.fail_on(TrackerOp::Comments).unwrap();

        let reports = Maintainer::new(&config, &tracker)
            .run(RunMode::Apply, now())
            .unwrap();

        assert!(matches!(reports[0].outcome, ItemOutcome::Skipped { .. }));
        assert!(tracker.mutations().unwrap().is_empty());
    }

    // =========================================================================
    // Run-level errors
    // =========================================================================

    #[test]
    fn test_invalid_config_aborts_before_items() {
        let mut config = config();
        config.milestone.active_milestone = String::new();
        let tracker = mixed_tracker();

        let err = Maintainer::new(&config, &tracker)
            .run(RunMode::Apply, now())
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(tracker.mutations().unwrap().is_empty());
    }

    #[test]
    fn test_item_listing_failure_aborts_run() {
        let config = config();
        let tracker = mixed_tracker();
        tracker.fail_on(TrackerOp::Items).unwrap();

        let err = Maintainer::new(&config, &tracker)
            .run(RunMode::Check, now())
            .unwrap_err();
        assert!(matches!(err, StewardError::Tracker { .. }));
    }

    #[test]
    fn test_report_serializes_with_outcome_tag() {
        let report = ItemReport {
            number: 4,
            title: "Issue 4".to_string(),
            outcome: ItemOutcome::Skipped {
                reason: "no history".to_string(),
            },
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "no history");
        assert_eq!(json["number"], 4);
    }
}
