//! Usage command - fetch once and display the result.

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};
use usagebar_store::{Config, RefreshOutcome};

use super::build_controller;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Runs the usage command.
pub async fn run(cli: &Cli, config: &Config) -> Result<ExitCode> {
    info!(source = %config.source.describe(), "Fetching usage");

    let (store, controller) = build_controller(config)?;
    let outcome = controller.refresh().await;
    debug!(outcome = ?outcome, "Refresh finished");

    let state = store.current_state();
    let now = Utc::now();

    match cli.format {
        OutputFormat::Json => {
            let formatter = JsonFormatter::for_cli(cli);
            println!("{}", formatter.format_state(&state, config.stale_after(), now)?);
        }
        OutputFormat::Text => {
            let formatter = TextFormatter::for_cli(cli);
            println!("{}", formatter.format_state(&state, config.stale_after(), now));
        }
    }

    Ok(match outcome {
        RefreshOutcome::Failed(_) => ExitCode::FetchFailed,
        _ => ExitCode::Success,
    })
}
