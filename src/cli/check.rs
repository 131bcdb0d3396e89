//! Check command for Steward.
//!
//! Resolves every item and reports the planned state without touching
//! the tracker.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::core::{ItemOutcome, ItemReport, Maintainer, RunMode};
use crate::tracker::IssueTracker;

/// Options for the check command.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the check command.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutput {
    /// Whether the command was successful.
    pub success: bool,
    /// Active milestone the items were checked against.
    pub milestone: String,
    /// Items subject to enforcement.
    pub items: Vec<ItemReport>,
    /// Number of items outside enforcement.
    pub ignored: usize,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckOutput {
    /// Create a successful output, splitting off ignored items.
    pub fn success(milestone: impl Into<String>, reports: Vec<ItemReport>) -> Self {
        let (ignored, items): (Vec<_>, Vec<_>) = reports
            .into_iter()
            .partition(|r| r.outcome == ItemOutcome::Ignored);
        let success = !items
            .iter()
            .any(|r| matches!(r.outcome, ItemOutcome::Failed { .. }));
        Self {
            success,
            milestone: milestone.into(),
            items,
            ignored: ignored.len(),
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            milestone: String::new(),
            items: Vec::new(),
            ignored: 0,
            error: Some(error.into()),
        }
    }
}

/// The check command implementation.
pub struct CheckCommand<T: IssueTracker> {
    tracker: T,
    config: Config,
}

impl<T: IssueTracker> CheckCommand<T> {
    /// Create a new check command.
    pub fn new(tracker: T, config: Config) -> Self {
        Self { tracker, config }
    }

    /// Run the check command.
    pub fn run(&self, options: &CheckOptions) -> CheckOutput {
        self.run_at(options, Utc::now())
    }

    /// Run the check command as of `now`.
    pub fn run_at(&self, _options: &CheckOptions, now: DateTime<Utc>) -> CheckOutput {
        let maintainer = Maintainer::new(&self.config, &self.tracker);
        match maintainer.run(RunMode::Check, now) {
            Ok(reports) => CheckOutput::success(&self.config.milestone.active_milestone, reports),
            Err(e) => CheckOutput::failure(e.to_string()),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &CheckOutput, options: &CheckOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    /// Format output as human-readable text.
    fn format_human_readable(&self, output: &CheckOutput) -> String {
        if output.error.is_some() {
            return format!(
                "Check failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        if output.items.is_empty() {
            return format!(
                "No open issues in milestone {} ({} ignored).\n",
                output.milestone, output.ignored
            );
        }

        let mut lines = vec![format!(
            "Checked {} issue(s) in milestone {} ({} ignored):\n",
            output.items.len(),
            output.milestone,
            output.ignored
        )];
        lines.extend(output.items.iter().map(describe_report));

        lines.join("\n") + "\n"
    }
}

/// One-line description of an item report.
pub(crate) fn describe_report(report: &ItemReport) -> String {
    let detail = match &report.outcome {
        ItemOutcome::Ignored => "ignored".to_string(),
        ItemOutcome::Skipped { reason } => format!("skipped ({})", reason),
        ItemOutcome::Planned {
            state,
            label,
            remove_from_milestone,
            ..
        } => {
            let mut detail = state.to_string();
            if let Some(label) = label {
                detail.push_str(&format!(" [{}]", label));
            }
            if *remove_from_milestone {
                detail.push_str(", would be removed from milestone");
            }
            detail
        }
        ItemOutcome::Applied { state, changes } => {
            let mut parts = Vec::new();
            for label in &changes.labels_added {
                parts.push(format!("+{}", label));
            }
            for label in &changes.labels_removed {
                parts.push(format!("-{}", label));
            }
            if changes.comment_posted.is_some() {
                parts.push("notified".to_string());
            }
            if changes.milestone_cleared {
                parts.push("removed from milestone".to_string());
            }
            if parts.is_empty() {
                format!("{}, unchanged", state)
            } else {
                format!("{}: {}", state, parts.join(", "))
            }
        }
        ItemOutcome::Failed { error } => format!("FAILED: {}", error),
    };

    if report.title.is_empty() {
        format!("  #{} {}", report.number, detail)
    } else {
        format!("  #{} {} - {}", report.number, report.title, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::TrackedItem;
    use crate::core::labels::LABELS_INCOMPLETE_LABEL;
    use crate::tracker::{MemoryTracker, TrackerOp};
    use chrono::TimeZone;

    const BOT: &str = "steward-bot";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 11, 20, 12, 0, 0).unwrap()
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.milestone.active_milestone = "v1.9".to_string();
        config.bot.name = BOT.to_string();
        config
    }

    fn setup() -> CheckCommand<MemoryTracker> {
        let mut labeled = TrackedItem::new(1, "alice", now())
            .with_labels(["sig/api"])
            .with_milestone("v1.9");
        labeled.title = "Flaky scheduler test".to_string();

        let mut pull = TrackedItem::new(2, "bob", now()).with_milestone("v1.9");
        pull.is_pull_request = true;

        let tracker = MemoryTracker::with_items(BOT, vec![labeled, pull]).unwrap();
        tracker.set_clock(now()).unwrap();
        CheckCommand::new(tracker, config())
    }

    #[test]
    fn test_check_reports_planned_states() {
        let cmd = setup();
        let output = cmd.run_at(&CheckOptions::default(), now());

        assert!(output.success);
        assert_eq!(output.milestone, "v1.9");
        assert_eq!(output.items.len(), 1);
        assert_eq!(output.ignored, 1);
        assert!(matches!(
            output.items[0].outcome,
            ItemOutcome::Planned {
                label: Some(LABELS_INCOMPLETE_LABEL),
                ..
            }
        ));
        assert!(cmd.tracker.mutations().unwrap().is_empty());
    }

    #[test]
    fn test_check_fails_on_invalid_config() {
        let tracker = MemoryTracker::new(BOT);
        let cmd = CheckCommand::new(tracker, Config::default());

        let output = cmd.run_at(&CheckOptions::default(), now());
        assert!(!output.success);
        assert!(output
            .error
            .as_deref()
            .unwrap()
            .contains("milestone.active_milestone"));
    }

    #[test]
    fn test_check_fails_when_items_unavailable() {
        let cmd = setup();
        cmd.tracker.fail_on(TrackerOp::Items).unwrap();

        let output = cmd.run_at(&CheckOptions::default(), now());
        assert!(!output.success);
        assert!(output.error.is_some());
    }

    #[test]
    fn test_format_output_quiet() {
        let cmd = setup();
        let options = CheckOptions {
            quiet: true,
            ..Default::default()
        };
        let output = cmd.run_at(&options, now());
        assert!(cmd.format_output(&output, &options).is_empty());
    }

    #[test]
    fn test_format_output_json() {
        let cmd = setup();
        let options = CheckOptions {
            json: true,
            ..Default::default()
        };
        let output = cmd.run_at(&options, now());
        let json: serde_json::Value =
            serde_json::from_str(&cmd.format_output(&output, &options)).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["items"][0]["outcome"], "planned");
        assert_eq!(json["items"][0]["state"], "needs_labeling");
        assert_eq!(json["items"][0]["label"], LABELS_INCOMPLETE_LABEL);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_format_output_human() {
        let cmd = setup();
        let output = cmd.run_at(&CheckOptions::default(), now());
        let text = cmd.format_output(&output, &CheckOptions::default());

        assert!(text.contains("Checked 1 issue(s) in milestone v1.9 (1 ignored)"));
        assert!(text.contains("#1 Flaky scheduler test - needs-labeling"));
        assert!(text.contains(LABELS_INCOMPLETE_LABEL));
    }

    #[test]
    fn test_format_output_failure() {
        let cmd = setup();
        let output = CheckOutput::failure("boom");
        let text = cmd.format_output(&output, &CheckOptions::default());
        assert_eq!(text, "Check failed: boom\n");
    }
}
