//! Poll controller.
//!
//! Drives [`UsageFetcher`] → [`UsageParser`] → [`UsageStateStore`], on demand
//! and on a periodic timer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};
use usagebar_fetch::{UsageFetcher, UsageParser};

use crate::state_store::UsageStateStore;

/// Default refresh interval (five minutes).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Shortest timer period; tokio intervals must be non-zero.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Error recorded when a refresh future is dropped before it completes.
pub const REFRESH_CANCELLED: &str = "refresh cancelled";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Settings & Outcomes
// ============================================================================

/// Poll controller settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Period of the background timer.
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollSettings {
    /// Creates settings with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

/// What a single [`PollController::refresh`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was installed.
    Updated,
    /// The fetch or parse failed; the message was stored.
    Failed(String),
    /// Another refresh was in flight, nothing was done.
    Coalesced,
    /// The controller was stopped while the fetch was pending.
    Cancelled,
    /// The controller was already stopped.
    Stopped,
}

impl RefreshOutcome {
    /// Returns true if this call actually wrote to the store.
    pub fn touched_store(&self) -> bool {
        matches!(self, RefreshOutcome::Updated | RefreshOutcome::Failed(_))
    }
}

// ============================================================================
// Poll Controller
// ============================================================================

/// Refreshes usage data and keeps the state store current.
///
/// At most one fetch is in flight at a time; overlapping refreshes coalesce.
/// [`stop`](Self::stop) is terminal.
pub struct PollController {
    store: Arc<UsageStateStore>,
    fetcher: Arc<dyn UsageFetcher>,
    parser: UsageParser,
    interval: Mutex<Duration>,
    shutdown: watch::Sender<bool>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for PollController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollController")
            .field("fetcher", &self.fetcher.id())
            .field("interval", &self.interval())
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl PollController {
    /// Creates a controller. No timer runs until
    /// [`start_periodic_refresh`](Self::start_periodic_refresh) is called.
    pub fn new(
        store: Arc<UsageStateStore>,
        fetcher: Arc<dyn UsageFetcher>,
        parser: UsageParser,
        settings: PollSettings,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            fetcher,
            parser,
            interval: Mutex::new(settings.interval),
            shutdown,
            timer: Mutex::new(None),
        }
    }

    /// The current timer period.
    pub fn interval(&self) -> Duration {
        *lock(&self.interval)
    }

    /// Returns true if the periodic timer is active.
    pub fn is_running(&self) -> bool {
        !self.is_stopped()
            && lock(&self.timer)
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Performs one fetch-parse-store cycle.
    ///
    /// Returns immediately with [`RefreshOutcome::Coalesced`] if a fetch is
    /// already in flight. If the controller is stopped while the fetch is
    /// pending, the fetch is dropped and the store is left untouched.
    ///
    /// Dropping the returned future mid-fetch (a timeout, an aborted task)
    /// completes the load with [`REFRESH_CANCELLED`] so later refreshes can
    /// run.
    #[instrument(skip(self), fields(fetcher = self.fetcher.id()))]
    pub async fn refresh(&self) -> RefreshOutcome {
        let shutdown = self.shutdown.subscribe();
        if self.is_stopped() {
            debug!("Refresh requested after stop");
            return RefreshOutcome::Stopped;
        }

        if self.store.begin_load().is_err() {
            debug!("Refresh already in flight, coalescing");
            return RefreshOutcome::Coalesced;
        }
        let guard = LoadGuard::new(self);

        let fetched = tokio::select! {
            biased;
            () = wait_for_stop(shutdown) => {
                guard.disarm();
                debug!("Refresh cancelled by stop");
                return RefreshOutcome::Cancelled;
            }
            result = self.fetcher.fetch() => result,
        };

        guard.disarm();
        if self.is_stopped() {
            debug!("Discarding fetch result after stop");
            return RefreshOutcome::Cancelled;
        }

        let parsed = fetched
            .map_err(|e| e.to_string())
            .and_then(|payload| self.parser.parse(&payload).map_err(|e| e.to_string()));

        match parsed {
            Ok(snapshot) => {
                self.store.complete_with_snapshot(snapshot);
                debug!("Refresh succeeded");
                RefreshOutcome::Updated
            }
            Err(message) => {
                warn!(error = %message, "Refresh failed");
                self.store.complete_with_error(message.clone());
                RefreshOutcome::Failed(message)
            }
        }
    }

    /// Runs [`refresh`](Self::refresh) on a background task.
    pub fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<RefreshOutcome> {
        let controller = Arc::clone(self);
        tokio::spawn(async move { controller.refresh().await })
    }

    /// Starts the periodic timer: one refresh now, then one per tick.
    ///
    /// Missed ticks are skipped. Calling this again replaces the previous
    /// timer without interrupting a fetch that is already in flight.
    pub fn start_periodic_refresh(self: &Arc<Self>, interval: Duration) {
        if self.is_stopped() {
            warn!("Ignoring periodic refresh request on a stopped controller");
            return;
        }

        let period = interval.max(MIN_TICK);
        *lock(&self.interval) = period;

        let controller: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                if controller.is_stopped() {
                    break;
                }
                // Detached so that replacing the timer never drops a pending fetch.
                drop(controller.spawn_refresh());
            }
        });

        if let Some(previous) = lock(&self.timer).replace(handle) {
            previous.abort();
            debug!("Replaced previous refresh timer");
        }
        info!(interval_secs = period.as_secs_f64(), "Periodic refresh started");
    }

    /// Cancels the timer and any in-flight fetch.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
        }
        info!("Poll controller stopped");
    }
}

impl Drop for PollController {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
        }
    }
}

/// Completes a started load with [`REFRESH_CANCELLED`] unless disarmed.
struct LoadGuard<'a> {
    controller: Option<&'a PollController>,
}

impl<'a> LoadGuard<'a> {
    fn new(controller: &'a PollController) -> Self {
        Self {
            controller: Some(controller),
        }
    }

    fn disarm(mut self) {
        self.controller = None;
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let Some(controller) = self.controller else {
            return;
        };
        // Nothing is written after shutdown.
        if controller.is_stopped() {
            return;
        }
        debug!("Refresh dropped mid-fetch");
        controller.store.complete_with_error(REFRESH_CANCELLED);
    }
}

/// Resolves once the shutdown flag is set.
async fn wait_for_stop(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
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
    fn test_default_settings() {
        assert_eq!(PollSettings::default().interval, Duration::from_secs(300));
        assert_eq!(
            PollSettings::new(Duration::from_secs(60)).interval,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_outcome_touched_store() {
        assert!(RefreshOutcome::Updated.touched_store());
        assert!(RefreshOutcome::Failed("x".into()).touched_store());
        assert!(!RefreshOutcome::Coalesced.touched_store());
        assert!(!RefreshOutcome::Cancelled.touched_store());
        assert!(!RefreshOutcome::Stopped.touched_store());
    }

    #[tokio::test]
    async fn test_wait_for_stop_resolves_when_flag_set() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(wait_for_stop(rx));
        tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
