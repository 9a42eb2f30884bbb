//! Config command - manage configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;
use usagebar_store::Config;

use super::{config_path, read_config_file, write_config_file};
use crate::output::JsonFormatter;
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show the configuration file path.
    Path,

    /// Set the refresh interval in seconds.
    SetInterval {
        /// Interval in seconds (at least 10).
        secs: u64,
    },

    /// Reset to defaults.
    Reset,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli, config: Config) -> Result<ExitCode> {
    match &args.action {
        ConfigAction::Show => show_config(&config, cli)?,
        ConfigAction::Path => show_path(cli)?,
        ConfigAction::SetInterval { secs } => set_interval(*secs, cli).await?,
        ConfigAction::Reset => reset_config(cli).await?,
    }
    Ok(ExitCode::Success)
}

fn show_config(config: &Config, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            println!("UsageBar Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Source:         {}", config.source.describe());
            println!("Poll interval:  {}s", config.poll_interval().as_secs());
            match config.stale_after_secs {
                Some(secs) => println!("Stale after:    {secs}s"),
                None => println!("Stale after:    never"),
            }
            println!("Log level:      {}", config.log_level);
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::for_cli(cli).format(config)?);
        }
    }
    Ok(())
}

fn show_path(cli: &Cli) -> Result<()> {
    let path = config_path(cli);
    match cli.format {
        OutputFormat::Text => println!("{}", path.display()),
        OutputFormat::Json => {
            let value = serde_json::json!({ "config": path.display().to_string() });
            println!("{}", JsonFormatter::for_cli(cli).format(&value)?);
        }
    }
    Ok(())
}

async fn set_interval(secs: u64, cli: &Cli) -> Result<()> {
    // Re-read the file so command-line source overrides are not persisted.
    let mut config = read_config_file(cli).await?;
    config.set_poll_interval(secs)?;
    write_config_file(cli, &config).await?;

    info!(secs, "Poll interval updated");
    if !cli.quiet {
        println!("Poll interval set to {secs}s");
    }
    Ok(())
}

async fn reset_config(cli: &Cli) -> Result<()> {
    write_config_file(cli, &Config::default()).await?;

    info!(path = %config_path(cli).display(), "Configuration reset");
    if !cli.quiet {
        println!("Configuration reset to defaults");
    }
    Ok(())
}
