//! Lifecycle state resolution.
//!
//! Decides which of the five lifecycle states an issue is in and builds
//! the notification for it. Resolution only reads: history lookups go
//! through the tracker, but nothing is mutated until the applier runs.
//!
//! Checks run in a fixed order: labels, then approval, then progress and
//! update cadence. The first failing check decides the state.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::{Config, MilestoneConfig};
use crate::core::grace::grace_remaining;
use crate::core::item::TrackedItem;
use crate::core::labels::{
    classify, APPROVED_LABEL, BLOCKER_LABEL, IN_PROGRESS_LABEL, LABELS_INCOMPLETE_LABEL,
    NEEDS_APPROVAL_LABEL,
};
use crate::core::message::{Message, ProgressNotes, RemovalReason, HELP_DETAILS};
use crate::core::notification::{Notification, NOTIFIER_NAME};
use crate::core::state::{LifecycleState, MilestoneMode};
use crate::error::{Result, StewardError};
use crate::tracker::IssueTracker;

/// Everything the applier needs to bring an issue in line with its state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// The resolved state.
    pub state: LifecycleState,
    /// Typed message the notification was rendered from.
    #[serde(skip)]
    pub message: Message,
    /// Notification to post (unless an equal one is still current).
    pub notification: Notification,
    /// State label to apply; `None` leaves no state label.
    pub label: Option<&'static str>,
    /// Clear the milestone once labels and comment are in place.
    pub remove_from_milestone: bool,
    /// Repost an unchanged notification after this long.
    #[serde(skip)]
    pub repeat_interval: Option<Duration>,
}

/// Resolves the lifecycle state of issues in the active milestone.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    milestone: &'a MilestoneConfig,
    warning_interval: Duration,
    bot_name: &'a str,
}

impl<'a> Resolver<'a> {
    /// Create a resolver for the given configuration.
    pub fn new(config: &'a Config) -> Self {
        Self {
            milestone: &config.milestone,
            warning_interval: config.milestone.warning_interval.duration(),
            bot_name: &config.bot.name,
        }
    }

    /// Check if the item is subject to milestone enforcement at all.
    ///
    /// Pull requests, closed issues and issues outside the active milestone
    /// are left alone.
    pub fn applies_to(&self, item: &TrackedItem) -> bool {
        if item.is_pull_request || !item.is_open() {
            return false;
        }
        match item.milestone.as_deref() {
            Some(title) if !title.is_empty() => title == self.milestone.active_milestone,
            _ => false,
        }
    }

    /// Resolve an item's state and notification.
    ///
    /// An `Indeterminate` error means the item's history could not be
    /// established and nothing should happen this cycle.
    pub fn resolve<T: IssueTracker + ?Sized>(
        &self,
        tracker: &T,
        item: &TrackedItem,
        now: DateTime<Utc>,
    ) -> Result<Resolution> {
        let message = self.message(tracker, item, now)?;
        Ok(self.finish(item, message))
    }

    /// Run the decision tree and return the typed message.
    pub fn message<T: IssueTracker + ?Sized>(
        &self,
        tracker: &T,
        item: &TrackedItem,
        now: DateTime<Utc>,
    ) -> Result<Message> {
        let is_blocker = item.has_label(BLOCKER_LABEL);
        let classification = classify(&item.labels);

        let Some(labels) = classification.summary() else {
            let grace = self.milestone.label_grace_period.duration();
            let deadline = grace_remaining(is_blocker, now, grace, || {
                self.grace_start(tracker, item, LABELS_INCOMPLETE_LABEL, now)
            })?;
            if deadline.is_expired() {
                return Ok(Message::NeedsRemoval {
                    reason: RemovalReason::IncompleteLabels {
                        errors: classification.errors,
                        grace_period: grace,
                    },
                    labels: None,
                });
            }
            return Ok(Message::NeedsLabeling {
                errors: classification.errors,
                removal_in: deadline.remaining(),
            });
        };

        if !item.has_label(APPROVED_LABEL) {
            let grace = self.milestone.approval_grace_period.duration();
            let deadline = grace_remaining(is_blocker, now, grace, || {
                self.grace_start(tracker, item, NEEDS_APPROVAL_LABEL, now)
            })?;
            if deadline.is_expired() {
                return Ok(Message::NeedsRemoval {
                    reason: RemovalReason::Unapproved {
                        grace_period: grace,
                    },
                    labels: Some(labels),
                });
            }
            return Ok(Message::NeedsApproval {
                labels,
                removal_in: deadline.remaining(),
            });
        }

        match self.milestone.mode {
            MilestoneMode::Dev => {
                return Ok(Message::Current {
                    labels,
                    progress: None,
                })
            }
            MilestoneMode::Freeze if !is_blocker => {
                return Ok(Message::NeedsRemoval {
                    reason: RemovalReason::NonBlockerInFreeze,
                    labels: Some(labels),
                })
            }
            _ => {}
        }

        let mut notes = ProgressNotes::new(self.milestone.mode);
        notes.missing_in_progress = !item.has_label(IN_PROGRESS_LABEL);

        if !is_blocker {
            notes.freeze_warning = Some(self.milestone.freeze_date.clone());
        } else if let Some(interval) = self.milestone.update_interval() {
            let last_updated = tracker.last_modified(item.number).map_err(|e| {
                StewardError::indeterminate(format!(
                    "#{}: last modification unavailable: {}",
                    item.number, e
                ))
            })?;
            if now.signed_duration_since(last_updated) > interval {
                notes.update_required_since = Some(last_updated);
            }
            notes.update_cadence = Some(interval);
        }

        Ok(Message::progress(labels, notes))
    }

    /// Render the notification and intents for a message.
    pub fn finish(&self, item: &TrackedItem, message: Message) -> Resolution {
        let state = message.state();

        let mut mentions: Vec<String> = item
            .participants()
            .iter()
            .map(|login| format!("@{}", login))
            .collect();
        if state.notifies_owners() {
            if let Some(labels) = message.labels() {
                mentions.extend(labels.owner_mentions());
            }
        }

        let body = format!(
            "{}\n\n{}\n\n{}",
            mentions.join(" "),
            message.render(&self.milestone.active_milestone),
            HELP_DETAILS
        );

        Resolution {
            state,
            notification: Notification::new(NOTIFIER_NAME, state.title(), &body),
            label: state.label(),
            remove_from_milestone: state.requires_removal(),
            repeat_interval: state.warns_on_interval().then_some(self.warning_interval),
            message,
        }
    }

    /// When the grace period for `label` started.
    ///
    /// If the issue does not carry the label yet, it starts now. Otherwise
    /// it started when the bot last applied the label; a missing or failed
    /// history lookup is indeterminate.
    fn grace_start<T: IssueTracker + ?Sized>(
        &self,
        tracker: &T,
        item: &TrackedItem,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        if !item.has_label(label) {
            return Ok(now);
        }
        match tracker.label_last_applied(item.number, label, self.bot_name) {
            Ok(Some(applied)) => Ok(applied),
            Ok(None) => Err(StewardError::indeterminate(format!(
                "#{}: no record of {} applying {}",
                item.number, self.bot_name, label
            ))),
            Err(e) => Err(StewardError::indeterminate(format!(
                "#{}: label history unavailable: {}",
                item.number, e
            ))),
        }
    }
}
