//! Run command for Steward.
//!
//! Resolves every item, applies labels, notifications and milestone
//! removals, then flushes the tracker.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::check::describe_report;
use crate::config::Config;
use crate::core::{ItemOutcome, ItemReport, Maintainer, RunMode};
use crate::tracker::IssueTracker;

/// Options for the run command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the run command.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    /// Whether every item was processed without error.
    pub success: bool,
    /// Active milestone.
    pub milestone: String,
    /// Items subject to enforcement.
    pub items: Vec<ItemReport>,
    /// Number of items changed.
    pub updated: usize,
    /// Number of items that failed.
    pub failed: usize,
    /// Number of items outside enforcement.
    pub ignored: usize,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunOutput {
    /// Create an output from the item reports.
    pub fn from_reports(milestone: impl Into<String>, reports: Vec<ItemReport>) -> Self {
        let (ignored, items): (Vec<_>, Vec<_>) = reports
            .into_iter()
            .partition(|r| r.outcome == ItemOutcome::Ignored);
        let updated = items
            .iter()
            .filter(|r| {
                matches!(&r.outcome, ItemOutcome::Applied { changes, .. } if !changes.is_empty())
            })
            .count();
        let failed = items
            .iter()
            .filter(|r| matches!(r.outcome, ItemOutcome::Failed { .. }))
            .count();
        Self {
            success: failed == 0,
            milestone: milestone.into(),
            items,
            updated,
            failed,
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
            updated: 0,
            failed: 0,
            ignored: 0,
            error: Some(error.into()),
        }
    }
}

/// The run command implementation.
pub struct RunCommand<T: IssueTracker> {
    tracker: T,
    config: Config,
}

impl<T: IssueTracker> RunCommand<T> {
    /// Create a new run command.
    pub fn new(tracker: T, config: Config) -> Self {
        Self { tracker, config }
    }

    /// Run the command.
    pub fn run(&self, options: &RunOptions) -> RunOutput {
        self.run_at(options, Utc::now())
    }

    /// Run the command as of `now`.
    ///
    /// The tracker is flushed whenever items were processed, including
    /// when some of them failed, so partial progress is kept.
    pub fn run_at(&self, _options: &RunOptions, now: DateTime<Utc>) -> RunOutput {
        let maintainer = Maintainer::new(&self.config, &self.tracker);
        let reports = match maintainer.run(RunMode::Apply, now) {
            Ok(reports) => reports,
            Err(e) => return RunOutput::failure(e.to_string()),
        };

        let mut output = RunOutput::from_reports(&self.config.milestone.active_milestone, reports);
        if let Err(e) = self.tracker.flush() {
            tracing::warn!(error = %e, "failed to save tracker changes");
            output.success = false;
            output.error = Some(format!("failed to save changes: {}", e));
        }
        output
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &RunOutput, options: &RunOptions) -> String {
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
    fn format_human_readable(&self, output: &RunOutput) -> String {
        if output.items.is_empty() && output.error.is_some() {
            return format!(
                "Run failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut lines = vec![format!(
            "Milestone {}: {} updated, {} failed, {} ignored\n",
            output.milestone, output.updated, output.failed, output.ignored
        )];
        lines.extend(output.items.iter().map(describe_report));
        if let Some(error) = &output.error {
            lines.push(String::new());
            lines.push(format!("Error: {}", error));
        }

        lines.join("\n") + "\n"
    }
}
