//! CLI commands for Steward.
//!
//! - **Maintenance commands**: check (dry run), run (apply)
//! - **Utility commands**: config

// Maintenance commands
pub mod check;
pub mod run;

// Utility commands
pub mod config_cmd;

pub use check::CheckCommand;
pub use config_cmd::ConfigCommand;
pub use run::RunCommand;
