//! CLI command implementations.

pub mod config;
pub mod usage;
pub mod watch;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use usagebar_fetch::UsageParser;
use usagebar_store::{Config, PollController, SourceConfig, UsageStateStore};

use crate::Cli;

/// The config file this invocation reads and writes.
pub fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(Config::default_path)
}

/// Reads the config file named by `--config`, or the default one.
pub async fn read_config_file(cli: &Cli) -> Result<Config> {
    let loaded = match &cli.config {
        Some(path) => Config::load_from(path).await,
        None => Config::load().await,
    };
    loaded.with_context(|| format!("failed to load {}", config_path(cli).display()))
}

/// Writes `config` to the file named by `--config`, or the default one.
pub async fn write_config_file(cli: &Cli, config: &Config) -> Result<()> {
    let saved = match &cli.config {
        Some(path) => config.save_to(path).await,
        None => config.save().await,
    };
    saved.with_context(|| format!("failed to save {}", config_path(cli).display()))
}

/// Loads the config file and applies `--url` / `--command` overrides.
pub async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = read_config_file(cli).await?;

    if let Some(url) = &cli.url {
        config.source = SourceConfig::http(url.clone());
    } else if let Some(command) = &cli.source_command {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .context("--command needs a program name")?;
        config.source = SourceConfig::command(program, parts.collect());
    }

    Ok(config)
}

/// Wires a state store and poll controller for `config`.
pub fn build_controller(config: &Config) -> Result<(Arc<UsageStateStore>, Arc<PollController>)> {
    let fetcher = config
        .build_fetcher()
        .context("failed to set up usage source")?;
    let store = Arc::new(UsageStateStore::new());
    let controller = Arc::new(PollController::new(
        Arc::clone(&store),
        fetcher,
        UsageParser::new(),
        config.poll_settings(),
    ));
    Ok((store, controller))
}
