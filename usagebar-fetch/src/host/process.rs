//! Command-backed usage fetcher.
//!
//! Runs a CLI that prints the usage screen (or a JSON document) and captures
//! its stdout as the raw payload.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::TransportError;
use crate::fetcher::UsageFetcher;
use crate::payload::RawPayload;

/// Default command timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches usage by running an external command.
#[derive(Debug, Clone)]
pub struct CommandUsageFetcher {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandUsageFetcher {
    /// Creates a fetcher running `program` with `args`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the command timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl UsageFetcher for CommandUsageFetcher {
    fn id(&self) -> &str {
        "command"
    }

    #[instrument(skip(self), fields(cmd = %self.program))]
    async fn fetch(&self) -> Result<RawPayload, TransportError> {
        // PATH lookup touches the filesystem.
        let program = self.program.clone();
        let path = tokio::task::spawn_blocking(move || which::which(program))
            .await
            .map_err(|e| TransportError::CommandFailed {
                code: -1,
                stderr: e.to_string(),
            })?
            .map_err(|_| {
                warn!("Command not found");
                TransportError::CommandNotFound(self.program.clone())
            })?;

        debug!(path = %path.display(), args = ?self.args, "Running command");
        let start = Instant::now();

        // kill_on_drop: a cancelled fetch must not leave the child running.
        let mut command = Command::new(&path);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result.map_err(|e| TransportError::CommandFailed {
                code: -1,
                stderr: e.to_string(),
            })?,
            Err(_) => {
                warn!(timeout = ?self.timeout, "Command timed out");
                return Err(TransportError::Timeout {
                    after: self.timeout,
                });
            }
        };

        debug!(
            exit_code = ?output.status.code(),
            duration_ms = start.elapsed().as_millis(),
            "Command completed"
        );

        if !output.status.success() {
            return Err(TransportError::CommandFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            return Err(TransportError::EmptyBody);
        }

        Ok(RawPayload::detect(stdout))
    }
}

// ============================================================================
// Tests
// ============================================================================
