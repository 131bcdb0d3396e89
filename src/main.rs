//! Steward - milestone lifecycle enforcement
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use steward::cli::check::{CheckCommand, CheckOptions};
use steward::cli::config_cmd::{ConfigCommand, ConfigOptions};
use steward::cli::run::{RunCommand, RunOptions};
use steward::config::{steward_home, Config};
use steward::error::exit_codes;
use steward::tracker::FileTracker;

// =============================================================================
// CLI Definition
// =============================================================================

/// Steward - keeps issues in the active milestone labeled, approved and moving
#[derive(Parser)]
#[command(name = "steward")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every issue and show what would change
    Check {
        /// JSON snapshot of the tracked items
        #[arg(long)]
        items: PathBuf,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Resolve every issue and apply labels, notifications and removals
    Run {
        /// JSON snapshot of the tracked items (rewritten in place)
        #[arg(long)]
        items: PathBuf,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Show the effective configuration
    Config {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();
    setup_logging();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("steward error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Set up the global panic handler.
///
/// On panic, logs to ~/.steward/crash.log and exits with the error code.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("steward panic: {}", info);

        if let Some(home) = steward_home() {
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::ERROR);
    }));
}

/// Install the stderr log subscriber, filtered by `STEWARD_LOG`.
fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("STEWARD_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run the CLI and return the exit code.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Check { items, json, quiet } => run_check(&items, json, quiet, &cwd),
        Commands::Run { items, json, quiet } => run_run(&items, json, quiet, &cwd),
        Commands::Config { json } => run_config(json, &cwd),
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

/// Convert a success boolean to an exit code.
fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::OK as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}

/// Load the configuration, reporting a malformed layer or every validation
/// problem.
///
/// Returns `None` when the configuration is invalid.
fn load_valid_config(cwd: &Path) -> Option<Config> {
    let config = match Config::load_from_cwd(cwd) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("steward: {}", e);
            return None;
        }
    };
    let problems = config.validation_errors();
    if problems.is_empty() {
        return Some(config);
    }
    for problem in problems {
        eprintln!("steward: {}", problem);
    }
    None
}

fn run_check(
    items: &Path,
    json: bool,
    quiet: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let Some(config) = load_valid_config(cwd) else {
        return Ok(ExitCode::from(exit_codes::INVALID_CONFIG as u8));
    };

    let tracker = FileTracker::open(items, config.bot.name.clone())?;
    let cmd = CheckCommand::new(tracker, config);
    let options = CheckOptions { json, quiet };

    let output = cmd.run(&options);
    let formatted = cmd.format_output(&output, &options);

    if !formatted.is_empty() {
        println!("{}", formatted.trim_end());
    }

    Ok(success_to_exit_code(output.success))
}

fn run_run(
    items: &Path,
    json: bool,
    quiet: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let Some(config) = load_valid_config(cwd) else {
        return Ok(ExitCode::from(exit_codes::INVALID_CONFIG as u8));
    };

    let tracker = FileTracker::open(items, config.bot.name.clone())?;
    let cmd = RunCommand::new(tracker, config);
    let options = RunOptions { json, quiet };

    let output = cmd.run(&options);
    let formatted = cmd.format_output(&output, &options);

    if !formatted.is_empty() {
        println!("{}", formatted.trim_end());
    }

    Ok(success_to_exit_code(output.success))
}

fn run_config(json: bool, cwd: &Path) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = match Config::load_from_cwd(cwd) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("steward: {}", e);
            return Ok(ExitCode::from(exit_codes::INVALID_CONFIG as u8));
        }
    };
    let cmd = ConfigCommand::new(config);
    let options = ConfigOptions { json };

    let output = cmd.run(&options);
    println!("{}", cmd.format_output(&output, &options).trim_end());

    if output.success {
        Ok(ExitCode::from(exit_codes::OK as u8))
    } else {
        Ok(ExitCode::from(exit_codes::INVALID_CONFIG as u8))
    }
}
