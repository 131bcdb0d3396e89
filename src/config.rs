//! Configuration loading for Steward.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.steward/config.toml`)
//! 3. User config (`~/.steward/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! A layer that is present but malformed fails the load. Once loaded,
//! [`Config::validate`] decides whether the result is usable before any
//! item is processed.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::core::state::{MilestoneMode, VALID_MODES};
use crate::error::{Result, StewardError};

/// A positive duration written as `72h`, `3d`, `90m` or `30s`.
///
/// A bare number is read as days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval(Duration);

impl Interval {
    /// Wrap a duration without checking it.
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// An interval of whole hours.
    pub fn hours(hours: i64) -> Self {
        Self(Duration::hours(hours))
    }

    /// The wrapped duration.
    pub fn duration(&self) -> Duration {
        self.0
    }

    /// Check if the interval is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > Duration::zero()
    }

    /// Parse an interval string like "7d", "24h", "30m".
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("interval cannot be empty".to_string());
        }

        let (num_str, unit) = if let Some(stripped) = s.strip_suffix('d') {
            (stripped, 'd')
        } else if let Some(stripped) = s.strip_suffix('h') {
            (stripped, 'h')
        } else if let Some(stripped) = s.strip_suffix('m') {
            (stripped, 'm')
        } else if let Some(stripped) = s.strip_suffix('s') {
            (stripped, 's')
        } else {
            (s, 'd')
        };

        let num: i64 = num_str
            .trim()
            .parse()
            .map_err(|_| format!("invalid interval number: {}", num_str))?;

        if num <= 0 {
            return Err(format!("interval must be positive: {}", s));
        }

        let duration = match unit {
            'd' => Duration::try_days(num),
            'h' => Duration::try_hours(num),
            'm' => Duration::try_minutes(num),
            _ => Duration::try_seconds(num),
        };
        duration
            .map(Self)
            .ok_or_else(|| format!("interval out of range: {}", s))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.num_seconds();
        if secs != 0 && secs % 86_400 == 0 {
            write!(f, "{}d", secs / 86_400)
        } else if secs % 3_600 == 0 {
            write!(f, "{}h", secs / 3_600)
        } else if secs % 60 == 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{}s", secs)
        }
    }
}

impl TryFrom<String> for Interval {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Interval> for String {
    fn from(interval: Interval) -> Self {
        interval.to_string()
    }
}

/// Main configuration struct for Steward.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Release process settings.
    pub milestone: MilestoneConfig,
    /// Bot identity.
    pub bot: BotConfig,
}

/// Release process settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MilestoneConfig {
    /// Title of the milestone being enforced.
    pub active_milestone: String,
    /// Phase of the release cycle.
    pub mode: MilestoneMode,
    /// Minimum time between repeated warnings.
    pub warning_interval: Interval,
    /// Time allowed to complete labels before removal.
    pub label_grace_period: Interval,
    /// Time allowed to obtain approval before removal.
    pub approval_grace_period: Interval,
    /// Blocker update cadence during code slush.
    pub slush_update_interval: Interval,
    /// Blocker update cadence during code freeze.
    pub freeze_update_interval: Interval,
    /// Human-readable code freeze date, shown in warnings.
    pub freeze_date: String,
}

impl MilestoneConfig {
    /// Blocker update cadence for the current mode.
    ///
    /// Development mode has no cadence.
    pub fn update_interval(&self) -> Option<Duration> {
        match self.mode {
            MilestoneMode::Dev => None,
            MilestoneMode::Slush => Some(self.slush_update_interval.duration()),
            MilestoneMode::Freeze => Some(self.freeze_update_interval.duration()),
        }
    }

    fn intervals(&self) -> [(&'static str, Interval); 5] {
        [
            ("milestone.warning_interval", self.warning_interval),
            ("milestone.label_grace_period", self.label_grace_period),
            ("milestone.approval_grace_period", self.approval_grace_period),
            ("milestone.slush_update_interval", self.slush_update_interval),
            ("milestone.freeze_update_interval", self.freeze_update_interval),
        ]
    }
}

impl Default for MilestoneConfig {
    fn default() -> Self {
        Self {
            active_milestone: String::new(),
            mode: MilestoneMode::Dev,
            warning_interval: Interval::hours(24),
            label_grace_period: Interval::hours(72),
            approval_grace_period: Interval::hours(168),
            slush_update_interval: Interval::hours(72),
            freeze_update_interval: Interval::hours(24),
            freeze_date: String::new(),
        }
    }
}

/// Bot identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    /// Account the bot acts as. Label events and notifications by this
    /// account are treated as the bot's own.
    pub name: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "steward-bot".to_string(),
        }
    }
}

type Validator = fn(&Config) -> Result<()>;

/// A validator and the options it reads.
struct OptionCheck {
    options: &'static [&'static str],
    check: Validator,
}

const CHECKS: &[OptionCheck] = &[
    OptionCheck {
        options: &["milestone.active_milestone"],
        check: validate_active_milestone,
    },
    OptionCheck {
        options: &[
            "milestone.warning_interval",
            "milestone.label_grace_period",
            "milestone.approval_grace_period",
            "milestone.slush_update_interval",
            "milestone.freeze_update_interval",
        ],
        check: validate_intervals,
    },
    OptionCheck {
        options: &["milestone.mode", "milestone.freeze_date"],
        check: validate_freeze_date,
    },
    OptionCheck {
        options: &["bot.name"],
        check: validate_bot_name,
    },
];

fn validate_active_milestone(config: &Config) -> Result<()> {
    if config.milestone.active_milestone.trim().is_empty() {
        return Err(StewardError::validation(
            "milestone.active_milestone",
            "must name the milestone to enforce",
        ));
    }
    Ok(())
}

fn validate_intervals(config: &Config) -> Result<()> {
    for (option, interval) in config.milestone.intervals() {
        if !interval.is_positive() {
            return Err(StewardError::validation(option, "must be greater than zero"));
        }
    }
    Ok(())
}

fn validate_freeze_date(config: &Config) -> Result<()> {
    if config.milestone.mode == MilestoneMode::Slush
        && config.milestone.freeze_date.trim().is_empty()
    {
        return Err(StewardError::validation(
            "milestone.freeze_date",
            "is required when mode is slush",
        ));
    }
    Ok(())
}

fn validate_bot_name(config: &Config) -> Result<()> {
    if config.bot.name.trim().is_empty() {
        return Err(StewardError::validation("bot.name", "must not be empty"));
    }
    Ok(())
}

impl Config {
    /// Load configuration with full precedence chain.
    pub fn load() -> Result<Self> {
        let cwd = env::current_dir()?;
        Self::load_from_cwd(&cwd)
    }

    /// Load configuration with a specific working directory.
    ///
    /// A config file that exists but does not parse, or an environment
    /// override with an invalid value, is an error.
    pub fn load_from_cwd(cwd: &Path) -> Result<Self> {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config()? {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd)? {
            config = config.merge(project_config);
        }

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Load user config from `~/.steward/config.toml`.
    fn load_user_config() -> Result<Option<Config>> {
        match steward_home() {
            Some(home) => Self::load_optional(&home.join("config.toml")),
            None => Ok(None),
        }
    }

    /// Load project config from `.steward/config.toml` at the project root.
    fn load_project_config(cwd: &Path) -> Result<Option<Config>> {
        Self::load_optional(&project_config_path(cwd))
    }

    /// Load a config layer that may legitimately be absent.
    fn load_optional(path: &Path) -> Result<Option<Config>> {
        if !path.is_file() {
            return Ok(None);
        }
        Self::load_from_file(path).map(Some)
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| StewardError::storage(path, e))?;
        toml::from_str(&content)
            .map_err(|e| StewardError::config(format!("{}: {}", path.display(), e)))
    }

    /// Apply environment variable overrides.
    ///
    /// Fails on the first variable whose value does not parse.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = env::var("STEWARD_ACTIVE_MILESTONE") {
            self.milestone.active_milestone = val;
        }

        if let Ok(val) = env::var("STEWARD_MODE") {
            self.milestone.mode = val.parse::<MilestoneMode>().map_err(|_| {
                StewardError::validation(
                    "STEWARD_MODE",
                    format!("'{}' is not one of {}", val, VALID_MODES.join(", ")),
                )
            })?;
        }

        let milestone = &mut self.milestone;
        let intervals: [(&str, &mut Interval); 5] = [
            ("STEWARD_WARNING_INTERVAL", &mut milestone.warning_interval),
            ("STEWARD_LABEL_GRACE_PERIOD", &mut milestone.label_grace_period),
            (
                "STEWARD_APPROVAL_GRACE_PERIOD",
                &mut milestone.approval_grace_period,
            ),
            (
                "STEWARD_SLUSH_UPDATE_INTERVAL",
                &mut milestone.slush_update_interval,
            ),
            (
                "STEWARD_FREEZE_UPDATE_INTERVAL",
                &mut milestone.freeze_update_interval,
            ),
        ];
        for (var, slot) in intervals {
            if let Ok(val) = env::var(var) {
                *slot = Interval::parse(&val)
                    .map_err(|e| StewardError::validation(var, format!("'{}': {}", val, e)))?;
            }
        }

        if let Ok(val) = env::var("STEWARD_FREEZE_DATE") {
            self.milestone.freeze_date = val;
        }

        if let Ok(val) = env::var("STEWARD_BOT_NAME") {
            if val.trim().is_empty() {
                return Err(StewardError::validation(
                    "STEWARD_BOT_NAME",
                    "must not be empty",
                ));
            }
            self.bot.name = val;
        }

        Ok(())
    }

    /// Merge another config into this one.
    ///
    /// The `other` config takes precedence, field by field: every value in
    /// `other` that differs from the default overrides `self`. A layer can
    /// therefore not reset a value back to its default.
    fn merge(mut self, other: Config) -> Self {
        let defaults = MilestoneConfig::default();
        let m = other.milestone;
        if m.active_milestone != defaults.active_milestone {
            self.milestone.active_milestone = m.active_milestone;
        }
        if m.mode != defaults.mode {
            self.milestone.mode = m.mode;
        }
        if m.warning_interval != defaults.warning_interval {
            self.milestone.warning_interval = m.warning_interval;
        }
        if m.label_grace_period != defaults.label_grace_period {
            self.milestone.label_grace_period = m.label_grace_period;
        }
        if m.approval_grace_period != defaults.approval_grace_period {
            self.milestone.approval_grace_period = m.approval_grace_period;
        }
        if m.slush_update_interval != defaults.slush_update_interval {
            self.milestone.slush_update_interval = m.slush_update_interval;
        }
        if m.freeze_update_interval != defaults.freeze_update_interval {
            self.milestone.freeze_update_interval = m.freeze_update_interval;
        }
        if m.freeze_date != defaults.freeze_date {
            self.milestone.freeze_date = m.freeze_date;
        }

        if other.bot.name != BotConfig::default().name {
            self.bot.name = other.bot.name;
        }

        self
    }

    /// Generate a diff of changed values between two configs.
    ///
    /// Returns a list of (key, old_value, new_value) tuples for changed fields.
    pub fn diff(&self, other: &Config) -> Vec<(String, String, String)> {
        let mut changes = Vec::new();
        let mut push = |key: &str, old: String, new: String| {
            if old != new {
                changes.push((key.to_string(), old, new));
            }
        };

        push(
            "milestone.active_milestone",
            self.milestone.active_milestone.clone(),
            other.milestone.active_milestone.clone(),
        );
        push(
            "milestone.mode",
            self.milestone.mode.to_string(),
            other.milestone.mode.to_string(),
        );
        for ((key, old), (_, new)) in self
            .milestone
            .intervals()
            .into_iter()
            .zip(other.milestone.intervals())
        {
            push(key, old.to_string(), new.to_string());
        }
        push(
            "milestone.freeze_date",
            self.milestone.freeze_date.clone(),
            other.milestone.freeze_date.clone(),
        );
        push("bot.name", self.bot.name.clone(), other.bot.name.clone());

        changes
    }

    /// Every validation failure, in option order.
    pub fn validation_errors(&self) -> Vec<StewardError> {
        CHECKS
            .iter()
            .filter_map(|c| (c.check)(self).err())
            .collect()
    }

    /// Run every option validator.
    pub fn validate(&self) -> Result<()> {
        match self.validation_errors().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Re-run only the validators whose options differ from `previous`.
    ///
    /// Used when the configuration is updated while running.
    pub fn validate_changed(&self, previous: &Config) -> Result<()> {
        let changed: Vec<String> = previous
            .diff(self)
            .into_iter()
            .map(|(key, _, _)| key)
            .collect();

        for check in CHECKS {
            if check
                .options
                .iter()
                .any(|option| changed.iter().any(|key| key == option))
            {
                (check.check)(self)?;
            }
        }
        Ok(())
    }
}

/// Get the Steward home directory.
///
/// Checks `STEWARD_HOME` first, then falls back to `~/.steward`. An empty
/// `STEWARD_HOME` is ignored.
pub fn steward_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("STEWARD_HOME") {
        if home.is_empty() {
            tracing::warn!("STEWARD_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("STEWARD_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".steward"));
    }

    let fallback = env::temp_dir().join("steward");
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback.display()
    );
    Some(fallback)
}

/// Find the project root for a given working directory.
///
/// Precedence:
/// 1. The nearest ancestor (or `cwd` itself) containing a `.steward/` directory.
/// 2. The git repository root, via `git rev-parse --show-toplevel`.
/// 3. `cwd`.
pub fn find_project_root(cwd: &Path) -> PathBuf {
    for ancestor in cwd.ancestors() {
        if ancestor.join(".steward").is_dir() {
            return ancestor.to_path_buf();
        }
    }

    if let Ok(output) = std::process::Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(cwd)
        .output()
    {
        if output.status.success() {
            if let Ok(path) = String::from_utf8(output.stdout) {
                let trimmed = path.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
        }
    }

    cwd.to_path_buf()
}

/// Project config path for a working directory.
///
/// Returns `<project_root>/.steward/config.toml`.
pub fn project_config_path(cwd: &Path) -> PathBuf {
    find_project_root(cwd).join(".steward").join("config.toml")
}
