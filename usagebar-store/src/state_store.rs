//! Observable usage state store.
//!
//! Owns the single [`UsageState`] and is its only writer. Every successful
//! mutation produces exactly one notification, delivered synchronously to
//! subscribers in registration order and then published on a watch channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::debug;
use usagebar_core::{UsageSnapshot, UsageState};

use crate::error::StoreError;

type Callback = Arc<dyn Fn(&UsageState) + Send + Sync>;
type Subscribers = Mutex<Vec<(u64, Callback)>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Usage State Store
// ============================================================================

/// Holds the observable usage state.
///
/// Callbacks may read the store and add or drop subscriptions, but must not
/// call the mutating operations: mutations are serialized together with
/// their notifications.
pub struct UsageStateStore {
    state: Mutex<UsageState>,
    /// Held across a mutation and its notification.
    publish: Mutex<()>,
    subscribers: Arc<Subscribers>,
    next_id: Mutex<u64>,
    watch_tx: watch::Sender<UsageState>,
}

impl Default for UsageStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UsageStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageStateStore")
            .field("state", &*lock(&self.state))
            .field("subscribers", &lock(&self.subscribers).len())
            .finish_non_exhaustive()
    }
}

impl UsageStateStore {
    /// Creates a store in the initial state: not loading, no snapshot, no error.
    pub fn new() -> Self {
        let (watch_tx, _) = watch::channel(UsageState::default());
        Self {
            state: Mutex::new(UsageState::default()),
            publish: Mutex::new(()),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_id: Mutex::new(0),
            watch_tx,
        }
    }

    /// Returns a copy of the current state.
    pub fn current_state(&self) -> UsageState {
        lock(&self.state).clone()
    }

    /// Marks a fetch as in flight.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrencyViolation`] if a fetch is already in
    /// flight. Nothing is changed or notified in that case.
    pub fn begin_load(&self) -> Result<(), StoreError> {
        self.try_mutate(|state| {
            if state.is_loading {
                return Err(StoreError::ConcurrencyViolation);
            }
            state.is_loading = true;
            Ok(())
        })?;
        debug!("Usage load started");
        Ok(())
    }

    /// Installs a freshly parsed snapshot and clears any error.
    ///
    /// `last_updated` never moves backwards: an older incoming timestamp is
    /// raised to the stored one.
    pub fn complete_with_snapshot(&self, snapshot: UsageSnapshot) {
        self.mutate(|state| {
            let snapshot = match &state.snapshot {
                Some(previous) if snapshot.last_updated() < previous.last_updated() => {
                    snapshot.with_last_updated(previous.last_updated())
                }
                _ => snapshot,
            };
            state.is_loading = false;
            state.snapshot = Some(snapshot);
            state.error_message = None;
        });
        debug!("Usage load completed with snapshot");
    }

    /// Records a failed fetch. The previous snapshot is kept.
    pub fn complete_with_error(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(error = %message, "Usage load completed with error");
        self.mutate(|state| {
            state.is_loading = false;
            state.error_message = Some(message);
        });
    }

    /// Registers a callback invoked with the full new state after every
    /// mutation.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&UsageState) + Send + Sync + 'static,
    {
        let id = {
            let mut next = lock(&self.next_id);
            *next += 1;
            *next
        };
        lock(&self.subscribers).push((id, Arc::new(callback)));
        debug!(id, "Subscriber registered");

        Subscription {
            id: Some(id),
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Returns a receiver that always holds the latest state.
    pub fn watch(&self) -> watch::Receiver<UsageState> {
        self.watch_tx.subscribe()
    }

    /// Number of registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    fn mutate<F>(&self, apply: F)
    where
        F: FnOnce(&mut UsageState),
    {
        let _publish = lock(&self.publish);
        let state = {
            let mut state = lock(&self.state);
            apply(&mut state);
            state.clone()
        };
        self.notify(state);
    }

    /// Like [`mutate`](Self::mutate), but `apply` may reject the change.
    /// Nothing is notified on rejection.
    fn try_mutate<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut UsageState) -> Result<(), StoreError>,
    {
        let _publish = lock(&self.publish);
        let state = {
            let mut state = lock(&self.state);
            apply(&mut state)?;
            state.clone()
        };
        self.notify(state);
        Ok(())
    }

    /// Must be called with the publish lock held.
    fn notify(&self, state: UsageState) {
        let callbacks: Vec<Callback> = lock(&self.subscribers)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(&state);
        }
        self.watch_tx.send_replace(state);
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle for a registered callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: Option<u64>,
    subscribers: Weak<Subscribers>,
}

impl Subscription {
    /// Removes the callback.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Keeps the callback registered for the lifetime of the store.
    pub fn detach(mut self) {
        self.id = None;
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(id) = self.id else { return };
        if let Some(subscribers) = self.subscribers.upgrade() {
            lock(&subscribers).retain(|(sid, _)| *sid != id);
            debug!(id, "Subscriber removed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn snapshot_at(secs: i64, session: f64) -> UsageSnapshot {
        UsageSnapshot::builder()
            .session(session, "2h")
            .weekly(10.0, "")
            .build_at(Utc.timestamp_opt(secs, 0).unwrap())
            .unwrap()
    }

    fn recorder(store: &UsageStateStore) -> (Arc<Mutex<Vec<UsageState>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = store.subscribe(move |state| sink.lock().unwrap().push(state.clone()));
        (seen, sub)
    }

    #[test]
    fn test_initial_state() {
        let store = UsageStateStore::new();
        assert_eq!(store.current_state(), UsageState::default());
    }

    #[test]
    fn test_begin_load_twice_is_rejected_silently() {
        let store = UsageStateStore::new();
        let (seen, _sub) = recorder(&store);

        store.begin_load().unwrap();
        let err = store.begin_load().unwrap_err();

        assert!(err.is_concurrency_violation());
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(store.current_state().is_loading);
    }

    #[test]
    fn test_complete_with_snapshot_clears_error() {
        let store = UsageStateStore::new();
        store.begin_load().unwrap();
        store.complete_with_error("timeout");
        assert_eq!(store.current_state().error_message.as_deref(), Some("timeout"));

        store.begin_load().unwrap();
        store.complete_with_snapshot(snapshot_at(10, 42.0));

        let state = store.current_state();
        assert!(!state.is_loading);
        assert!(state.error_message.is_none());
        assert_eq!(state.snapshot.unwrap().session_percentage(), 42.0);
    }

    #[test]
    fn test_error_keeps_previous_snapshot() {
        let store = UsageStateStore::new();
        store.begin_load().unwrap();
        store.complete_with_snapshot(snapshot_at(10, 42.0));

        store.begin_load().unwrap();
        store.complete_with_error("network unreachable");

        let state = store.current_state();
        assert!(!state.is_loading);
        assert_eq!(state.snapshot, Some(snapshot_at(10, 42.0)));
        assert_eq!(state.error_message.as_deref(), Some("network unreachable"));
    }

    #[test]
    fn test_last_updated_never_moves_backwards() {
        let store = UsageStateStore::new();
        store.complete_with_snapshot(snapshot_at(500, 1.0));
        store.complete_with_snapshot(snapshot_at(100, 2.0));

        let snapshot = store.current_state().snapshot.unwrap();
        assert_eq!(snapshot.last_updated(), Utc.timestamp_opt(500, 0).unwrap());
        assert_eq!(snapshot.session_percentage(), 2.0);
    }

    #[test]
    fn test_notifications_in_mutation_order() {
        let store = UsageStateStore::new();
        let (seen, _sub) = recorder(&store);

        store.begin_load().unwrap();
        store.complete_with_snapshot(snapshot_at(1, 5.0));
        store.begin_load().unwrap();
        store.complete_with_error("boom");

        let seen = seen.lock().unwrap();
        let flags: Vec<_> = seen
            .iter()
            .map(|s| (s.is_loading, s.has_snapshot(), s.error_message.is_some()))
            .collect();
        assert_eq!(
            flags,
            vec![
                (true, false, false),
                (false, true, false),
                (true, true, false),
                (false, true, true),
            ]
        );
    }

    #[test]
    fn test_subscribers_called_in_registration_order() {
        let store = UsageStateStore::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let subs: Vec<_> = (0..3)
            .map(|i| {
                let order = Arc::clone(&order);
                store.subscribe(move |_| order.lock().unwrap().push(i))
            })
            .collect();

        store.complete_with_error("x");
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        drop(subs);
    }

    #[test]
    fn test_drop_unsubscribes_and_detach_keeps() {
        let store = UsageStateStore::new();
        let (dropped, sub) = recorder(&store);
        let (detached, keep) = recorder(&store);
        keep.detach();
        sub.unsubscribe();

        store.complete_with_error("x");

        assert!(dropped.lock().unwrap().is_empty());
        assert_eq!(detached.lock().unwrap().len(), 1);
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn test_callback_can_read_store() {
        let store = Arc::new(UsageStateStore::new());
        let reader = Arc::clone(&store);
        let matched = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&matched);

        let _sub = store.subscribe(move |state| {
            *flag.lock().unwrap() = reader.current_state() == *state;
        });
        store.begin_load().unwrap();

        assert!(*matched.lock().unwrap());
    }

    #[test]
    fn test_rejected_begin_load_does_not_publish() {
        let store = UsageStateStore::new();
        let mut rx = store.watch();

        store.begin_load().unwrap();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        assert!(store.begin_load().is_err());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_watch_receives_latest_state() {
        let store = UsageStateStore::new();
        let mut rx = store.watch();
        assert!(!rx.borrow().is_loading);

        store.begin_load().unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_loading);

        store.complete_with_snapshot(snapshot_at(3, 9.0));
        rx.changed().await.unwrap();
        assert!(rx.borrow().has_snapshot());
    }
}
