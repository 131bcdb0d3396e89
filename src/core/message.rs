//! Notification message model and rendering.
//!
//! Each lifecycle state has its own message variant carrying only the
//! facts that state reports. Rendering is a pure function of the message
//! and the active milestone name: identical inputs always produce
//! byte-identical text, which is what makes reposting idempotent.

use chrono::{DateTime, Duration, Utc};

use crate::core::labels::{
    quote_label, LabelSummary, APPROVED_LABEL, BLOCKER_LABEL, IN_PROGRESS_LABEL, KIND_LABELS,
    PRIORITY_LABELS,
};
use crate::core::state::{LifecycleState, MilestoneMode};

/// Fixed help block appended to every notification.
pub const HELP_DETAILS: &str = "<details>
<summary>Help</summary>
<ul>
 <li><a href=\"https://github.com/kubernetes/community/blob/master/contributors/devel/release/issues.md\">Additional instructions</a></li>
 <li><a href=\"https://github.com/kubernetes/test-infra/blob/master/commands.md\">Commands for setting labels</a></li>
</ul>
</details>";

const UPDATE_EXAMPLE: &str = "Example update:

```
ACK.  In progress
ETA: DD/MM/YYYY
Risks: Complicated fix required
```";

/// Progress and update findings for slush and freeze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressNotes {
    /// Current release mode (slush or freeze).
    pub mode: MilestoneMode,
    /// The in-progress label is missing.
    pub missing_in_progress: bool,
    /// Last update time, when it is older than the update interval.
    pub update_required_since: Option<DateTime<Utc>>,
    /// Required update cadence for blockers.
    pub update_cadence: Option<Duration>,
    /// Freeze date for the non-blocker warning.
    pub freeze_warning: Option<String>,
}

impl ProgressNotes {
    /// Create empty notes for a mode.
    pub fn new(mode: MilestoneMode) -> Self {
        Self {
            mode,
            missing_in_progress: false,
            update_required_since: None,
            update_cadence: None,
            freeze_warning: None,
        }
    }

    /// Check if the notes demand action.
    pub fn needs_attention(&self) -> bool {
        self.missing_in_progress || self.update_required_since.is_some()
    }
}

/// Why an issue is being removed from the milestone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalReason {
    /// Labels stayed incomplete past the label grace period.
    IncompleteLabels {
        errors: Vec<String>,
        grace_period: Duration,
    },
    /// Approval stayed missing past the approval grace period.
    Unapproved { grace_period: Duration },
    /// Only blockers may stay during code freeze.
    NonBlockerInFreeze,
}

/// Message content for a resolved lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Nothing is required; optional progress reminders may still apply.
    Current {
        labels: LabelSummary,
        progress: Option<ProgressNotes>,
    },
    /// Labels are incomplete.
    NeedsLabeling {
        errors: Vec<String>,
        removal_in: Option<Duration>,
    },
    /// The approval label is missing.
    NeedsApproval {
        labels: LabelSummary,
        removal_in: Option<Duration>,
    },
    /// Progress is missing or an update is overdue.
    NeedsAttention {
        labels: LabelSummary,
        progress: ProgressNotes,
    },
    /// The issue is moved out of the milestone.
    ///
    /// Labels are kept for owner mentions but never summarized.
    NeedsRemoval {
        reason: RemovalReason,
        labels: Option<LabelSummary>,
    },
}

impl Message {
    /// Build the message for the slush/freeze progress checks.
    pub fn progress(labels: LabelSummary, notes: ProgressNotes) -> Self {
        if notes.needs_attention() {
            Message::NeedsAttention {
                labels,
                progress: notes,
            }
        } else {
            Message::Current {
                labels,
                progress: Some(notes),
            }
        }
    }

    /// The lifecycle state this message reports.
    pub fn state(&self) -> LifecycleState {
        match self {
            Message::Current { .. } => LifecycleState::Current,
            Message::NeedsLabeling { .. } => LifecycleState::NeedsLabeling,
            Message::NeedsApproval { .. } => LifecycleState::NeedsApproval,
            Message::NeedsAttention { .. } => LifecycleState::NeedsAttention,
            Message::NeedsRemoval { .. } => LifecycleState::NeedsRemoval,
        }
    }

    /// Labels to summarize, when the classification was valid.
    pub fn labels(&self) -> Option<&LabelSummary> {
        match self {
            Message::Current { labels, .. }
            | Message::NeedsApproval { labels, .. }
            | Message::NeedsAttention { labels, .. } => Some(labels),
            Message::NeedsRemoval { labels, .. } => labels.as_ref(),
            Message::NeedsLabeling { .. } => None,
        }
    }

    /// Render the message sections for the given milestone.
    pub fn render(&self, milestone: &str) -> String {
        let milestone = format!("{} milestone", milestone);
        let (sections, summary) = match self {
            Message::Current { labels, progress } => (
                progress
                    .as_ref()
                    .map(|notes| progress_sections(notes, &milestone))
                    .unwrap_or_default(),
                Some(label_summary(labels, true)),
            ),
            Message::NeedsLabeling { errors, removal_in } => (
                vec![incomplete_labels_warning(errors, *removal_in, &milestone)],
                None,
            ),
            Message::NeedsApproval { labels, removal_in } => (
                vec![unapproved_warning(*removal_in, &milestone)],
                Some(label_summary(labels, false)),
            ),
            Message::NeedsAttention { labels, progress } => (
                progress_sections(progress, &milestone),
                Some(label_summary(labels, false)),
            ),
            Message::NeedsRemoval { reason, .. } => {
                (vec![removal_notice(reason, &milestone)], None)
            }
        };

        // Sections are separated by a blank line; the label summary follows
        // directly on the next line.
        let text = sections.join("\n\n");
        match summary {
            Some(summary) if text.is_empty() => summary,
            Some(summary) => format!("{}\n{}", text, summary),
            None => text,
        }
    }
}

fn unapproved_warning(removal_in: Option<Duration>, milestone: &str) -> String {
    let warning = removal_in
        .map(|left| {
            format!(
                " If the label is not applied within {}, the issue will be moved out of the {}.",
                format_interval(left),
                milestone
            )
        })
        .unwrap_or_default();
    format!(
        "**Action required**: This issue must have the {} label applied by a SIG maintainer.{}",
        quote_label(APPROVED_LABEL),
        warning
    )
}

fn incomplete_labels_warning(
    errors: &[String],
    removal_in: Option<Duration>,
    milestone: &str,
) -> String {
    let warning = removal_in
        .map(|left| {
            format!(
                " If the required changes are not made within {}, the issue will be moved out of the {}.",
                format_interval(left),
                milestone
            )
        })
        .unwrap_or_default();
    format!(
        "**Action required**: This issue requires label changes.{}\n\n{}",
        warning,
        errors.join("\n")
    )
}

fn progress_sections(notes: &ProgressNotes, milestone: &str) -> Vec<String> {
    let mut sections = Vec::new();

    if notes.missing_in_progress {
        sections.push(format!(
            "**Action required**: During code {}, issues in the milestone should be in progress.\n\
             If this issue is not being actively worked on, please remove it from the milestone.\n\
             If it is being worked on, please add the {} label so it can be tracked with other in-flight issues.",
            notes.mode,
            quote_label(IN_PROGRESS_LABEL)
        ));
    }

    if let Some(last_updated) = notes.update_required_since {
        sections.push(format!(
            "**Action Required**: This issue has not been updated since {}. Please provide an update.",
            last_updated.format("%b %-d")
        ));
    }

    if let Some(cadence) = notes.update_cadence {
        sections.push(format!(
            "**Note**: This issue is marked as {}, and must be updated every {} during code {}.\n\n{}",
            quote_label(BLOCKER_LABEL),
            format_interval(cadence),
            notes.mode,
            UPDATE_EXAMPLE
        ));
    }

    if let Some(freeze_date) = &notes.freeze_warning {
        sections.push(format!(
            "**Note**: If this issue is not resolved or labeled as {} by {} it will be moved out of the {}.",
            quote_label(BLOCKER_LABEL),
            freeze_date,
            milestone
        ));
    }

    sections
}

fn removal_notice(reason: &RemovalReason, milestone: &str) -> String {
    match reason {
        RemovalReason::Unapproved { grace_period } => format!(
            "**Important**: This issue was missing the {} label for more than {}.",
            quote_label(APPROVED_LABEL),
            format_interval(*grace_period)
        ),
        RemovalReason::NonBlockerInFreeze => format!(
            "**Important**: Code freeze is in effect and only issues with {} may remain in the {}.",
            quote_label(BLOCKER_LABEL),
            milestone
        ),
        RemovalReason::IncompleteLabels {
            errors,
            grace_period,
        } => format!(
            "**Important**: This issue was missing labels required for the {} for more than {}:\n\n{}",
            milestone,
            format_interval(*grace_period),
            errors.join("\n")
        ),
    }
}

fn label_summary(labels: &LabelSummary, open: bool) -> String {
    let owners = labels
        .owners
        .iter()
        .map(|label| quote_label(label))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<details{}>\n<summary>Issue Labels</summary>\n\n\
         - {}: Issue will be escalated to these SIGs if needed.\n\
         - {}: {}\n\
         - {}: {}\n\
         </details>",
        if open { " open" } else { "" },
        owners,
        quote_label(&labels.priority),
        PRIORITY_LABELS.description(&labels.priority).unwrap_or_default(),
        quote_label(&labels.kind),
        KIND_LABELS.description(&labels.kind).unwrap_or_default(),
    )
}

/// Format a duration for display in a notification.
///
/// Durations of a day or more render as whole days (`6d`, truncated);
/// shorter ones as hours, minutes and seconds (`5h30m0s`, `45m0s`, `0s`).
pub fn format_interval(duration: Duration) -> String {
    let days = duration.num_days();
    if days >= 1 {
        return format!("{}d", days);
    }

    let total = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
