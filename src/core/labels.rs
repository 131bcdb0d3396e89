//! Label vocabulary and classification for milestone issues.
//!
//! An issue in the active milestone must carry exactly one kind label,
//! exactly one priority label and at least one owner (`sig/`) label.
//! Classification is a pure function over fixed lookup tables.

use serde::{Deserialize, Serialize};

/// Applied while kind/priority/owner labels are incomplete.
pub const LABELS_INCOMPLETE_LABEL: &str = "milestone/incomplete-labels";
/// Applied while the approval label is missing.
pub const NEEDS_APPROVAL_LABEL: &str = "milestone/needs-approval";
/// Applied while progress or an update is missing.
pub const NEEDS_ATTENTION_LABEL: &str = "milestone/needs-attention";
/// Applied when the issue is moved out of the milestone.
pub const REMOVED_LABEL: &str = "milestone/removed";

/// Every label the maintainer manages. At most one is present at a time.
///
/// The approval label is not included: it is applied by people, not by us.
pub const STATE_LABELS: &[&str] = &[
    LABELS_INCOMPLETE_LABEL,
    NEEDS_APPROVAL_LABEL,
    NEEDS_ATTENTION_LABEL,
    REMOVED_LABEL,
];

/// Applied by an owning group to accept the issue into the milestone.
pub const APPROVED_LABEL: &str = "status/approved-for-milestone";
/// Marks an issue as actively being worked on.
pub const IN_PROGRESS_LABEL: &str = "status/in-progress";
/// Top-severity priority. Never evicted, but must be updated regularly.
pub const BLOCKER_LABEL: &str = "priority/critical-urgent";

/// Prefix shared by owner-group labels.
pub const OWNER_LABEL_PREFIX: &str = "sig/";

/// A closed set of candidate labels of which exactly one must be present.
#[derive(Debug, Clone, Copy)]
pub struct LabelChoice {
    /// Category name used in error messages.
    pub category: &'static str,
    /// Candidate labels with their descriptions.
    pub options: &'static [(&'static str, &'static str)],
}

/// Kind labels.
pub const KIND_LABELS: LabelChoice = LabelChoice {
    category: "kind",
    options: &[
        ("kind/bug", "Fixes a bug discovered during the current release."),
        ("kind/feature", "New functionality."),
        ("kind/cleanup", "Adding tests, refactoring, fixing old bugs."),
    ],
};

/// Priority labels.
pub const PRIORITY_LABELS: LabelChoice = LabelChoice {
    category: "priority",
    options: &[
        (
            BLOCKER_LABEL,
            "Never automatically move out of a release milestone; continually escalate to contributor and SIG through all available channels.",
        ),
        (
            "priority/important-soon",
            "Escalate to the issue owners and SIG owner; move out of milestone after several unsuccessful escalation attempts.",
        ),
        (
            "priority/important-longterm",
            "Escalate to the issue owners; move out of the milestone after 1 attempt.",
        ),
    ],
};

impl LabelChoice {
    /// Check if a label belongs to this choice.
    pub fn contains(&self, label: &str) -> bool {
        self.options.iter().any(|(name, _)| *name == label)
    }

    /// Get the description of a candidate label.
    pub fn description(&self, label: &str) -> Option<&'static str> {
        self.options
            .iter()
            .find(|(name, _)| *name == label)
            .map(|(_, description)| *description)
    }

    /// Select the single matching label.
    ///
    /// Returns `None` when no candidate or more than one candidate is present.
    pub fn select<'a>(&self, labels: &'a [String]) -> Option<&'a str> {
        let mut matching = labels.iter().filter(|label| self.contains(label));
        let first = matching.next()?;
        if matching.next().is_some() {
            return None;
        }
        Some(first.as_str())
    }

    /// The error reported when selection fails.
    ///
    /// Missing and duplicate labels share this message.
    pub fn error_message(&self) -> String {
        format!(
            "_**{}**_: Must specify exactly one of {}.",
            self.category,
            format_label_list(self.options.iter().map(|(name, _)| *name))
        )
    }
}

/// Format label names as "`a`, `b` or `c`", sorted.
fn format_label_list<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let mut quoted: Vec<String> = names.map(quote_label).collect();
    quoted.sort();

    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
    }
}

/// Format a label as inline markdown code.
pub fn quote_label(label: &str) -> String {
    if label.is_empty() {
        return String::new();
    }
    format!("`{}`", label)
}

/// Mention handle for the group owning an owner label.
pub fn owner_mention(label: &str) -> String {
    let group = label.strip_prefix(OWNER_LABEL_PREFIX).unwrap_or(label);
    format!("@kubernetes/sig-{}-bugs", group)
}

/// The labels of a correctly classified issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSummary {
    /// The kind label.
    pub kind: String,
    /// The priority label.
    pub priority: String,
    /// Owner labels in the order they appear on the issue.
    pub owners: Vec<String>,
}

impl LabelSummary {
    /// Mentions for every owning group.
    pub fn owner_mentions(&self) -> Vec<String> {
        self.owners.iter().map(|label| owner_mention(label)).collect()
    }
}

/// Result of classifying an issue's labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// The unique kind label, if exactly one is present.
    pub kind: Option<String>,
    /// The unique priority label, if exactly one is present.
    pub priority: Option<String>,
    /// All owner labels.
    pub owners: Vec<String>,
    /// Human-readable errors; empty means the labels are complete.
    pub errors: Vec<String>,
}

impl Classification {
    /// Check if the labels satisfy every category.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the label summary of a valid classification.
    pub fn summary(&self) -> Option<LabelSummary> {
        if !self.is_valid() {
            return None;
        }
        Some(LabelSummary {
            kind: self.kind.clone()?,
            priority: self.priority.clone()?,
            owners: self.owners.clone(),
        })
    }
}

/// Classify the given labels.
pub fn classify(labels: &[String]) -> Classification {
    let mut errors = Vec::new();

    let kind = KIND_LABELS.select(labels).map(str::to_string);
    if kind.is_none() {
        errors.push(KIND_LABELS.error_message());
    }

    let priority = PRIORITY_LABELS.select(labels).map(str::to_string);
    if priority.is_none() {
        errors.push(PRIORITY_LABELS.error_message());
    }

    let owners: Vec<String> = labels
        .iter()
        .filter(|label| label.starts_with(OWNER_LABEL_PREFIX))
        .cloned()
        .collect();
    if owners.is_empty() {
        errors.push(format!(
            "_**sig owner**_: Must specify at least one label prefixed with `{}`.",
            OWNER_LABEL_PREFIX
        ));
    }

    Classification {
        kind,
        priority,
        owners,
        errors,
    }
}
