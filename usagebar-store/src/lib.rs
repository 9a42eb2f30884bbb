// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # UsageBar Store
//!
//! State management for UsageBar.
//!
//! This crate provides:
//!
//! - **UsageStateStore**: The observable usage state with subscriptions
//! - **PollController**: On-demand and periodic refresh
//! - **Config**: JSON configuration with persistence
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use usagebar_fetch::UsageParser;
//! use usagebar_store::{Config, PollController, UsageStateStore};
//!
//! let config = Config::load().await?;
//! let store = Arc::new(UsageStateStore::new());
//! let controller = Arc::new(PollController::new(
//!     store.clone(),
//!     config.build_fetcher()?,
//!     UsageParser::new(),
//!     config.poll_settings(),
//! ));
//!
//! let _sub = store.subscribe(|state| println!("{state:?}"));
//! controller.start_periodic_refresh(config.poll_interval());
//! ```

pub mod config;
pub mod error;
pub mod persistence;
pub mod poll;
pub mod state_store;

pub use config::{Config, SourceConfig, MIN_POLL_INTERVAL_SECS};
pub use error::StoreError;
pub use persistence::{default_config_dir, default_config_path, load_json, save_json};
pub use poll::{
    PollController, PollSettings, RefreshOutcome, DEFAULT_POLL_INTERVAL, REFRESH_CANCELLED,
};
pub use state_store::{Subscription, UsageStateStore};
