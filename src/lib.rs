//! Steward - milestone lifecycle enforcement
//!
//! Steward keeps issues in a release milestone labeled, approved and
//! moving. Each cycle it resolves every issue to a lifecycle state, keeps
//! the state label and notification comment in sync, and removes issues
//! that ran out of grace from the milestone.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod tracker;

pub use config::{Config, Interval};
pub use core::{
    ItemOutcome, ItemReport, LifecycleState, Maintainer, MilestoneMode, Notification,
    Resolution, Resolver, RunMode,
};
pub use error::{Result, StewardError};
pub use tracker::{FileTracker, IssueTracker, MemoryTracker};

// CLI commands
pub use cli::{CheckCommand, ConfigCommand, RunCommand};
