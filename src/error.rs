//! Unified error types for Steward.
//!
//! Every failure is scoped to a single item in a single cycle. Tracker and
//! history errors abort the remaining steps for that item and are retried
//! implicitly on the next evaluation. Only configuration errors stop a
//! command before any item is touched.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Steward operations.
#[derive(Error, Debug)]
pub enum StewardError {
    /// I/O errors from snapshot or config files.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The issue tracker rejected or failed a read or mutation.
    #[error("tracker error: {message}")]
    Tracker { message: String },

    /// The item's history could not establish a required timestamp.
    #[error("indeterminate history: {message}")]
    Indeterminate { message: String },

    /// JSON or TOML parsing/serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// A configuration option failed validation.
    #[error("invalid option {option}: {message}")]
    Validation { option: String, message: String },
}

/// A specialized Result type for Steward operations.
pub type Result<T> = std::result::Result<T, StewardError>;

impl StewardError {
    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a tracker error.
    pub fn tracker(message: impl Into<String>) -> Self {
        Self::Tracker {
            message: message.into(),
        }
    }

    /// Create an indeterminate history error.
    pub fn indeterminate(message: impl Into<String>) -> Self {
        Self::Indeterminate {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a validation error for a named option.
    pub fn validation(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            option: option.into(),
            message: message.into(),
        }
    }

    /// Check if this error means "do nothing this cycle" rather than a
    /// failed mutation.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Indeterminate { .. })
    }

    /// Check if this error must stop the command before processing items.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Validation { .. })
    }
}

impl From<io::Error> for StewardError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for StewardError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Exit codes for the Steward CLI.
pub mod exit_codes {
    /// Every item was processed (individual item failures are logged).
    pub const OK: i32 = 0;

    /// The command could not run (unreadable snapshot, I/O failure).
    pub const ERROR: i32 = 1;

    /// Configuration failed validation; no item was processed.
    pub const INVALID_CONFIG: i32 = 2;
}
