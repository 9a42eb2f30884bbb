// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! UsageBar CLI - Claude plan usage from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Show current usage
//! usagebar
//!
//! # JSON output
//! usagebar --format json --pretty
//!
//! # Read usage from the vendor CLI instead of the HTTP endpoint
//! usagebar --command "claude /usage"
//!
//! # Live dashboard
//! usagebar watch --interval 60
//!
//! # Configuration
//! usagebar config show
//! usagebar config set-interval 120
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{config, usage, watch};

// ============================================================================
// CLI Definition
// ============================================================================

/// UsageBar CLI - Claude plan usage monitoring.
#[derive(Parser)]
#[command(name = "usagebar")]
#[command(about = "Claude plan usage monitoring CLI")]
#[command(long_about = r#"
UsageBar shows how much of your Claude plan you have used:

  • Current session (5-hour window)
  • Weekly limit across all models
  • Weekly Sonnet-only limit (when in use)

Examples:
  usagebar                         # One refresh, print usage
  usagebar --format json           # JSON output
  usagebar watch                   # Live dashboard
  usagebar config show             # Show configuration
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'usage' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Use this config file instead of the default one.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Poll this usage endpoint instead of the configured source.
    #[arg(long, global = true, value_name = "URL", conflicts_with = "source_command")]
    pub url: Option<String>,

    /// Run this command (with arguments) to obtain usage output.
    #[arg(long = "command", global = true, value_name = "PROGRAM")]
    pub source_command: Option<String>,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch current usage (default if no command specified).
    #[command(visible_alias = "u")]
    Usage,

    /// Keep refreshing and redraw on every change.
    #[command(visible_alias = "w")]
    Watch(watch::WatchArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

impl Commands {
    fn tolerates_bad_config(&self) -> bool {
        matches!(
            self,
            Commands::Config(config::ConfigArgs {
                action: config::ConfigAction::Path | config::ConfigAction::Reset,
            })
        )
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Usage could not be fetched or parsed.
    FetchFailed = 2,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool, level: &str) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("usagebar=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("usagebar={level}")))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match commands::load_config(&cli).await {
        Ok(config) => config,
        // A broken config file must not prevent resetting it.
        Err(_) if cli.command.as_ref().is_some_and(Commands::tolerates_bad_config) => {
            usagebar_store::Config::default()
        }
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    };

    setup_logging(cli.verbose, cli.quiet, &config.log_level);

    let result = match &cli.command {
        Some(Commands::Usage) | None => usage::run(&cli, &config).await,
        Some(Commands::Watch(args)) => watch::run(args, &cli, &config).await,
        Some(Commands::Config(args)) => config::run(args, &cli, config).await,
    };

    match result {
        Ok(ExitCode::Success) => Ok(()),
        Ok(code) => std::process::exit(code as i32),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    }
}
