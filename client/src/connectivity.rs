//! Network reachability monitor.
//!
//! Wraps a platform reachability signal into a current boolean state plus an
//! edge-triggered "became reachable" notification. Observers are registered
//! by identity and can be removed without affecting each other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Callback run on every down→up transition.
pub type ReconnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Identity of a registered observer.
pub type SubscriptionId = u64;

/// Tracks reachability and notifies observers on reconnect.
///
/// Thread-safe and can be shared via `Arc`.
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
    /// Reconnect observers, keyed by subscription id.
    observers: DashMap<SubscriptionId, ReconnectCallback>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("connected", &self.is_connected())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ConnectivityMonitor {
    /// Create a monitor with a known initial state.
    pub fn new(connected: bool) -> Self {
        let (state, _) = watch::channel(connected);
        Self {
            state,
            observers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a monitor wrapped in Arc for sharing.
    pub fn new_shared(connected: bool) -> Arc<Self> {
        Arc::new(Self::new(connected))
    }

    /// Current reachability.
    pub fn is_connected(&self) -> bool {
        *self.state.borrow()
    }

    /// Feed a reachability reading from the platform.
    ///
    /// Observers run only when this flips the state from down to up.
    pub fn set_connected(&self, connected: bool) {
        let was_connected = self.state.send_replace(connected);

        match (was_connected, connected) {
            (false, true) => {
                tracing::info!(observers = self.observers.len(), "Network reachable again");
                self.notify_reconnect();
            }
            (true, false) => tracing::info!("Network lost"),
            _ => {}
        }
    }

    /// Receiver tracking the current state, for async consumers.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Register a reconnect observer.
    pub fn on_reconnect<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers.insert(id, Arc::new(callback));

        tracing::debug!(subscription = id, "Reconnect observer registered");

        Subscription {
            id,
            monitor: Arc::downgrade(self),
        }
    }

    /// Remove an observer by id. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.observers.remove(&id).is_some() {
            tracing::debug!(subscription = id, "Reconnect observer removed");
        }
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Drive the monitor from a platform signal stream until it ends.
    pub fn attach<S>(self: &Arc<Self>, signal: S) -> JoinHandle<()>
    where
        S: Stream<Item = bool> + Send + 'static,
    {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut signal = Box::pin(signal);
            while let Some(connected) = signal.next().await {
                monitor.set_connected(connected);
            }
            tracing::debug!("Reachability signal closed");
        })
    }

    fn notify_reconnect(&self) {
        // Snapshot first: callbacks may unsubscribe while we iterate
        let callbacks: Vec<ReconnectCallback> = self
            .observers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for callback in callbacks {
            callback();
        }
    }
}

/// Handle returned by [`ConnectivityMonitor::on_reconnect`].
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    monitor: Weak<ConnectivityMonitor>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop receiving notifications. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if let Some(monitor) = self.monitor.upgrade() {
            monitor.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter(monitor: &Arc<ConnectivityMonitor>) -> (Arc<AtomicUsize>, Subscription) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let sub = monitor.on_reconnect(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (hits, sub)
    }

    #[test]
    fn fires_only_on_rising_edge() {
        let monitor = ConnectivityMonitor::new_shared(false);
        let (hits, _sub) = counter(&monitor);

        monitor.set_connected(false);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        monitor.set_connected(true);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Sustained up
        monitor.set_connected(true);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Falling edge
        monitor.set_connected(false);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        monitor.set_connected(true);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn initially_connected_does_not_fire() {
        let monitor = ConnectivityMonitor::new_shared(true);
        let (hits, _sub) = counter(&monitor);

        monitor.set_connected(true);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(monitor.is_connected());
    }

    #[test]
    fn unsubscribe_is_idempotent_and_isolated() {
        let monitor = ConnectivityMonitor::new_shared(false);
        let (first, first_sub) = counter(&monitor);
        let (second, _second_sub) = counter(&monitor);
        assert_eq!(monitor.observer_count(), 2);

        first_sub.unsubscribe();
        first_sub.unsubscribe();
        assert_eq!(monitor.observer_count(), 1);

        monitor.set_connected(true);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_after_monitor_dropped() {
        let monitor = ConnectivityMonitor::new_shared(false);
        let (_, sub) = counter(&monitor);
        drop(monitor);
        sub.unsubscribe();
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let monitor = ConnectivityMonitor::new_shared(false);
        let weak = Arc::downgrade(&monitor);
        let id = Arc::new(AtomicU64::new(0));
        let own_id = Arc::clone(&id);

        let sub = monitor.on_reconnect(move || {
            if let Some(m) = weak.upgrade() {
                m.unsubscribe(own_id.load(Ordering::SeqCst));
            }
        });
        id.store(sub.id(), Ordering::SeqCst);

        monitor.set_connected(true);
        assert_eq!(monitor.observer_count(), 0);
    }

    #[tokio::test]
    async fn watch_follows_state() {
        let monitor = ConnectivityMonitor::new_shared(false);
        let mut rx = monitor.watch();

        monitor.set_connected(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn attach_drives_state_from_stream() {
        let monitor = ConnectivityMonitor::new_shared(true);
        let (hits, _sub) = counter(&monitor);

        let signal = futures::stream::iter(vec![false, false, true, true, false, true]);
        monitor.attach(signal).await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(monitor.is_connected());
    }
}
