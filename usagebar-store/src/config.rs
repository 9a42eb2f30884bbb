//! Configuration management.
//!
//! The config file is JSON with every field optional:
//!
//! ```json
//! {
//!   "poll_interval_secs": 300,
//!   "stale_after_secs": 900,
//!   "log_level": "warn",
//!   "source": { "type": "http", "url": "https://api.anthropic.com/api/oauth/usage" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use usagebar_fetch::{CommandUsageFetcher, HttpUsageFetcher, UsageFetcher};

use crate::error::StoreError;
use crate::persistence::{default_config_path, load_json, save_json};
use crate::poll::PollSettings;

/// Shortest poll interval accepted from configuration.
pub const MIN_POLL_INTERVAL_SECS: u64 = 10;

/// Default usage endpoint.
pub const DEFAULT_USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";

/// Default environment variable holding the bearer token.
pub const DEFAULT_TOKEN_ENV: &str = "USAGEBAR_TOKEN";

fn default_poll_interval() -> u64 {
    300
}

fn default_stale_after() -> Option<u64> {
    Some(900)
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_url() -> String {
    DEFAULT_USAGE_URL.to_string()
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([("anthropic-beta".to_string(), "oauth-2025-04-20".to_string())])
}

// ============================================================================
// Config
// ============================================================================

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Refresh interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Age after which displayed data is flagged as stale; `None` disables it.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: Option<u64>,
    /// Where usage data comes from.
    #[serde(default)]
    pub source: SourceConfig,
    /// Log level used when no `--verbose` flag or `RUST_LOG` is given.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Usage data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Poll an HTTP endpoint.
    Http {
        /// Endpoint URL.
        #[serde(default = "default_url")]
        url: String,
        /// Environment variable holding the bearer token.
        #[serde(default = "default_token_env")]
        token_env: String,
        /// Extra request headers.
        #[serde(default = "default_headers")]
        headers: BTreeMap<String, String>,
        /// Request timeout in seconds.
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
    /// Run a command that prints the usage screen.
    Command {
        /// Program name or path.
        program: String,
        /// Arguments.
        #[serde(default)]
        args: Vec<String>,
        /// Command timeout in seconds.
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Http {
            url: default_url(),
            token_env: default_token_env(),
            headers: default_headers(),
            timeout_secs: default_timeout(),
        }
    }
}

impl SourceConfig {
    /// An HTTP source for `url` with default settings.
    pub fn http(url: impl Into<String>) -> Self {
        SourceConfig::Http {
            url: url.into(),
            token_env: default_token_env(),
            headers: default_headers(),
            timeout_secs: default_timeout(),
        }
    }

    /// A command source running `program` with `args`.
    pub fn command(program: impl Into<String>, args: Vec<String>) -> Self {
        SourceConfig::Command {
            program: program.into(),
            args,
            timeout_secs: default_timeout(),
        }
    }

    /// Short description for display.
    pub fn describe(&self) -> String {
        match self {
            SourceConfig::Http { url, .. } => format!("http {url}"),
            SourceConfig::Command { program, args, .. } if args.is_empty() => {
                format!("command {program}")
            }
            SourceConfig::Command { program, args, .. } => {
                format!("command {program} {}", args.join(" "))
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            stale_after_secs: default_stale_after(),
            source: SourceConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        default_config_path()
    }

    /// Loads configuration from the default path.
    pub async fn load() -> Result<Self, StoreError> {
        Self::load_from(&Self::default_path()).await
    }

    /// Loads configuration from a specific path; a missing file yields defaults.
    pub async fn load_from(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let config: Config = load_json(path).await?;
        config.validate()?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to the default path.
    pub async fn save(&self) -> Result<(), StoreError> {
        self.save_to(&Self::default_path()).await
    }

    /// Saves configuration to a specific path.
    pub async fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        self.validate()?;
        save_json(path, self).await?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> Result<(), StoreError> {
        match &self.source {
            SourceConfig::Http { url, .. } if url.trim().is_empty() => {
                Err(StoreError::Config("source url is empty".to_string()))
            }
            SourceConfig::Command { program, .. } if program.trim().is_empty() => {
                Err(StoreError::Config("source program is empty".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// The refresh interval, never shorter than the minimum.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS))
    }

    /// Sets the refresh interval.
    pub fn set_poll_interval(&mut self, secs: u64) -> Result<(), StoreError> {
        if secs < MIN_POLL_INTERVAL_SECS {
            return Err(StoreError::Config(format!(
                "poll interval must be at least {MIN_POLL_INTERVAL_SECS} seconds"
            )));
        }
        self.poll_interval_secs = secs;
        Ok(())
    }

    /// The staleness threshold, if enabled.
    pub fn stale_after(&self) -> Option<chrono::Duration> {
        self.stale_after_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .map(chrono::Duration::seconds)
    }

    /// Poll controller settings derived from this config.
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings::new(self.poll_interval())
    }

    /// Builds the fetcher described by `source`.
    ///
    /// The HTTP bearer token is read from the configured environment variable
    /// at build time.
    pub fn build_fetcher(&self) -> Result<Arc<dyn UsageFetcher>, StoreError> {
        self.validate()?;

        match &self.source {
            SourceConfig::Http {
                url,
                token_env,
                headers,
                timeout_secs,
            } => {
                let token = std::env::var(token_env).ok();
                if token.is_none() {
                    debug!(env = %token_env, "No bearer token in environment");
                }

                let mut fetcher =
                    HttpUsageFetcher::new(url, token, Duration::from_secs(*timeout_secs))
                        .map_err(|e| StoreError::Config(e.to_string()))?;
                for (name, value) in headers {
                    fetcher = fetcher
                        .with_header(name, value)
                        .map_err(|e| StoreError::Config(e.to_string()))?;
                }
                Ok(Arc::new(fetcher))
            }
            SourceConfig::Command {
                program,
                args,
                timeout_secs,
            } => Ok(Arc::new(
                CommandUsageFetcher::new(program.clone(), args.clone())
                    .with_timeout(Duration::from_secs(*timeout_secs)),
            )),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(300));
        assert_eq!(config.stale_after(), Some(chrono::Duration::seconds(900)));
        assert_eq!(config.log_level, "warn");
        assert!(matches!(
            &config.source,
            SourceConfig::Http { url, token_env, .. }
                if url == DEFAULT_USAGE_URL && token_env == DEFAULT_TOKEN_ENV
        ));
    }

    #[test]
    fn test_poll_interval_floor() {
        let config = Config {
            poll_interval_secs: 1,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.poll_settings().interval, Duration::from_secs(10));
    }

    #[test]
    fn test_set_poll_interval() {
        let mut config = Config::default();
        assert!(config.set_poll_interval(5).is_err());
        config.set_poll_interval(60).unwrap();
        assert_eq!(config.poll_interval_secs, 60);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"poll_interval_secs": 120}"#).unwrap();
        assert_eq!(config.poll_interval_secs, 120);
        assert_eq!(config.stale_after_secs, Some(900));
        assert_eq!(config.source, SourceConfig::default());
    }

    #[test]
    fn test_command_source_json() {
        let config: Config = serde_json::from_str(
            r#"{"source": {"type": "command", "program": "claude", "args": ["/usage"]}, "stale_after_secs": null}"#,
        )
        .unwrap();
        assert_eq!(
            config.source,
            SourceConfig::command("claude", vec!["/usage".to_string()])
        );
        assert_eq!(config.stale_after(), None);
        assert_eq!(config.source.describe(), "command claude /usage");
    }

    #[test]
    fn test_validate_rejects_empty_source() {
        let config = Config {
            source: SourceConfig::command("  ", vec![]),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(StoreError::Config(_))));
        assert!(config.build_fetcher().is_err());
    }

    #[test]
    fn test_build_fetcher() {
        let http = Config::default().build_fetcher().unwrap();
        assert_eq!(http.id(), "http");

        let command = Config {
            source: SourceConfig::command("claude", vec![]),
            ..Default::default()
        };
        assert_eq!(command.build_fetcher().unwrap().id(), "command");

        let bad = Config {
            source: SourceConfig::http("ftp://example.com"),
            ..Default::default()
        };
        assert!(matches!(bad.build_fetcher(), Err(StoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_load_missing_file_gives_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&temp_dir.path().join("config.json"))
            .await
            .unwrap();
        assert_eq!(config, Config::default());
    }
}
