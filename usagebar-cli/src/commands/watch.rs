//! Watch command - live usage dashboard.

use anyhow::Result;
use chrono::{Local, Utc};
use clap::Args;
use std::io::{stdout, Write};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use usagebar_core::UsageState;
use usagebar_store::{Config, MIN_POLL_INTERVAL_SECS};

use super::build_controller;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Refresh interval in seconds (defaults to the configured interval).
    #[arg(long, short)]
    pub interval: Option<u64>,
}

/// Runs the watch command until Ctrl+C.
pub async fn run(args: &WatchArgs, cli: &Cli, config: &Config) -> Result<ExitCode> {
    let interval_secs = args
        .interval
        .unwrap_or(config.poll_interval_secs)
        .max(MIN_POLL_INTERVAL_SECS);

    info!(interval = interval_secs, "Starting watch mode");

    let (store, controller) = build_controller(config)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<UsageState>();
    let _subscription = store.subscribe(move |state| {
        let _ = tx.send(state.clone());
    });

    let text = TextFormatter::for_cli(cli);
    let json = JsonFormatter::for_cli(cli);

    controller.start_periodic_refresh(Duration::from_secs(interval_secs));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            Some(state) = rx.recv() => {
                let now = Utc::now();
                match cli.format {
                    OutputFormat::Json => {
                        println!("{}", json.format_state(&state, config.stale_after(), now)?);
                    }
                    OutputFormat::Text => {
                        // Clear screen
                        print!("\x1b[2J\x1b[H");
                        println!(
                            "UsageBar Watch Mode - {} (refresh: {}s)",
                            Local::now().format("%H:%M:%S"),
                            interval_secs
                        );
                        println!("{}", "─".repeat(40));
                        println!();
                        println!("{}", text.format_state(&state, config.stale_after(), now));
                        println!();
                        println!("Press Ctrl+C to exit");
                    }
                }
                stdout().flush()?;
            }
        }
    }

    controller.stop();
    info!("Watch mode stopped");
    Ok(ExitCode::Success)
}
