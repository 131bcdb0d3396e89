//! Lifecycle states and release modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::labels::{
    LABELS_INCOMPLETE_LABEL, NEEDS_APPROVAL_LABEL, NEEDS_ATTENTION_LABEL, REMOVED_LABEL,
};

/// Phase of the release cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneMode {
    /// Normal development. Approved issues need nothing further.
    #[default]
    Dev,
    /// Code slush. Issues must be in progress; blockers must be updated.
    Slush,
    /// Code freeze. Only blockers may remain.
    Freeze,
}

/// Valid values for the milestone mode, sorted.
pub const VALID_MODES: &[&str] = &["dev", "freeze", "slush"];

impl MilestoneMode {
    /// The mode name as it appears in config and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneMode::Dev => "dev",
            MilestoneMode::Slush => "slush",
            MilestoneMode::Freeze => "freeze",
        }
    }
}

impl fmt::Display for MilestoneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MilestoneMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(MilestoneMode::Dev),
            "slush" => Ok(MilestoneMode::Slush),
            "freeze" => Ok(MilestoneMode::Freeze),
            other => Err(format!(
                "unknown milestone mode '{}', must be one of {:?}",
                other, VALID_MODES
            )),
        }
    }
}

/// Lifecycle state of an issue in the active milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No change is required.
    Current,
    /// One or more priority, kind or owner labels are missing.
    NeedsLabeling,
    /// The approval label is missing.
    NeedsApproval,
    /// The in-progress label is missing or an update is required.
    NeedsAttention,
    /// The issue must be moved out of the milestone.
    NeedsRemoval,
}

impl LifecycleState {
    /// State label to apply; `None` for `Current`.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            LifecycleState::Current => None,
            LifecycleState::NeedsLabeling => Some(LABELS_INCOMPLETE_LABEL),
            LifecycleState::NeedsApproval => Some(NEEDS_APPROVAL_LABEL),
            LifecycleState::NeedsAttention => Some(NEEDS_ATTENTION_LABEL),
            LifecycleState::NeedsRemoval => Some(REMOVED_LABEL),
        }
    }

    /// Title of the notification comment.
    pub fn title(&self) -> &'static str {
        match self {
            LifecycleState::Current => "Milestone Issue **Current**",
            LifecycleState::NeedsLabeling => "Milestone Labels **Incomplete**",
            LifecycleState::NeedsApproval => "Milestone Issue **Needs Approval**",
            LifecycleState::NeedsAttention => "Milestone Issue **Needs Attention**",
            LifecycleState::NeedsRemoval => "Milestone **Removed**",
        }
    }

    /// Whether the notification is reposted once the warning interval elapses.
    pub fn warns_on_interval(&self) -> bool {
        matches!(
            self,
            LifecycleState::NeedsLabeling
                | LifecycleState::NeedsApproval
                | LifecycleState::NeedsAttention
        )
    }

    /// Whether owning groups are mentioned in the notification.
    pub fn notifies_owners(&self) -> bool {
        matches!(
            self,
            LifecycleState::NeedsApproval
                | LifecycleState::NeedsAttention
                | LifecycleState::NeedsRemoval
        )
    }

    /// Whether the issue is cleared from the milestone.
    pub fn requires_removal(&self) -> bool {
        matches!(self, LifecycleState::NeedsRemoval)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Current => "current",
            LifecycleState::NeedsLabeling => "needs-labeling",
            LifecycleState::NeedsApproval => "needs-approval",
            LifecycleState::NeedsAttention => "needs-attention",
            LifecycleState::NeedsRemoval => "needs-removal",
        };
        f.write_str(name)
    }
}
