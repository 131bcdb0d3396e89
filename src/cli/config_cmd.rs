//! Config command for Steward.
//!
//! Shows the effective configuration, the options that differ from the
//! defaults and any validation problems.

use serde::Serialize;

use crate::config::Config;

/// Options for the config command.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Output as JSON.
    pub json: bool,
}

/// An option whose effective value differs from its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Override {
    pub option: String,
    pub default: String,
    pub value: String,
}

/// Output format for the config command.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigOutput {
    /// Whether the configuration is valid.
    pub success: bool,
    /// The effective configuration.
    pub config: Config,
    /// Options changed from their defaults.
    pub overrides: Vec<Override>,
    /// Validation problems, one per failing check.
    pub problems: Vec<String>,
}

/// The config command implementation.
pub struct ConfigCommand {
    config: Config,
}

impl ConfigCommand {
    /// Create a new config command for the effective configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the config command.
    pub fn run(&self, _options: &ConfigOptions) -> ConfigOutput {
        let problems: Vec<String> = self
            .config
            .validation_errors()
            .iter()
            .map(|e| e.to_string())
            .collect();
        let overrides = Config::default()
            .diff(&self.config)
            .into_iter()
            .map(|(option, default, value)| Override {
                option,
                default,
                value,
            })
            .collect();

        ConfigOutput {
            success: problems.is_empty(),
            config: self.config.clone(),
            overrides,
            problems,
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ConfigOutput, options: &ConfigOptions) -> String {
        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    /// Format output as human-readable text.
    fn format_human_readable(&self, output: &ConfigOutput) -> String {
        let mut lines = Vec::new();

        match toml::to_string_pretty(&output.config) {
            Ok(rendered) => lines.push(rendered.trim_end().to_string()),
            Err(e) => lines.push(format!("# unable to render configuration: {}", e)),
        }
        lines.push(String::new());

        if !output.overrides.is_empty() {
            lines.push("Overridden options:".to_string());
            for o in &output.overrides {
                lines.push(format!("  {} = {} (default {})", o.option, o.value, o.default));
            }
            lines.push(String::new());
        }

        if output.problems.is_empty() {
            lines.push("Configuration is valid.".to_string());
        } else {
            lines.push(format!("{} problem(s):", output.problems.len()));
            for problem in &output.problems {
                lines.push(format!("  - {}", problem));
            }
        }

        lines.join("\n") + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::MilestoneMode;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.milestone.active_milestone = "v1.9".to_string();
        config
    }

    #[test]
    fn test_valid_config() {
        let cmd = ConfigCommand::new(valid_config());
        let output = cmd.run(&ConfigOptions::default());

        assert!(output.success);
        assert!(output.problems.is_empty());
        assert_eq!(output.overrides.len(), 1);
        assert_eq!(output.overrides[0].option, "milestone.active_milestone");
        assert_eq!(output.overrides[0].value, "v1.9");
    }

    #[test]
    fn test_default_config_reports_problems() {
        let cmd = ConfigCommand::new(Config::default());
        let output = cmd.run(&ConfigOptions::default());

        assert!(!output.success);
        assert_eq!(output.problems.len(), 1);
        assert!(output.problems[0].contains("milestone.active_milestone"));
        assert!(output.overrides.is_empty());
    }

    #[test]
    fn test_every_failing_check_is_reported() {
        let mut config = Config::default();
        config.milestone.mode = MilestoneMode::Slush;
        config.bot.name = String::new();

        let output = ConfigCommand::new(config).run(&ConfigOptions::default());
        assert_eq!(output.problems.len(), 3);
    }

    #[test]
    fn test_format_output_human() {
        let cmd = ConfigCommand::new(valid_config());
        let output = cmd.run(&ConfigOptions::default());
        let text = cmd.format_output(&output, &ConfigOptions::default());

        assert!(text.contains("[milestone]"));
        assert!(text.contains("active_milestone = \"v1.9\""));
        assert!(text.contains("Overridden options:"));
        assert!(text.contains("Configuration is valid."));
    }

    #[test]
    fn test_format_output_json() {
        let cmd = ConfigCommand::new(Config::default());
        let options = ConfigOptions { json: true };
        let output = cmd.run(&options);
        let json: serde_json::Value =
            serde_json::from_str(&cmd.format_output(&output, &options)).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["config"]["milestone"]["mode"], "dev");
        assert_eq!(json["config"]["milestone"]["label_grace_period"], "3d");
        assert_eq!(json["problems"].as_array().unwrap().len(), 1);
    }
}
