//! Connectivity state.

use tokio::sync::watch;
use tracing::info;

/// Reports whether the device is online and notifies on changes.
pub trait Connectivity: Send + Sync {
    /// Returns the current state.
    fn is_connected(&self) -> bool;

    /// Subscribes to state changes. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// A connectivity provider whose state is set explicitly.
///
/// Platform integrations feed it from their native reachability API; tests
/// flip it by hand.
#[derive(Debug)]
pub struct ManualConnectivity {
    state: watch::Sender<bool>,
}

impl ManualConnectivity {
    /// Creates a provider with the given initial state.
    pub fn new(connected: bool) -> Self {
        let (state, _) = watch::channel(connected);
        Self { state }
    }

    /// Sets the state. Subscribers are only notified on actual changes.
    pub fn set_connected(&self, connected: bool) {
        let changed = self.state.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        });
        if changed {
            info!(connected, "connectivity changed");
        }
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.state.receiver_count()
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ManualConnectivity {
    fn is_connected(&self) -> bool {
        *self.state.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notifies_on_change_only() {
        let connectivity = ManualConnectivity::new(false);
        let mut rx = connectivity.subscribe();
        assert!(!connectivity.is_connected());

        connectivity.set_connected(false);
        assert!(!rx.has_changed().unwrap());

        connectivity.set_connected(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        assert!(connectivity.is_connected());
    }

    #[test]
    fn dropping_receiver_unsubscribes() {
        let connectivity = ManualConnectivity::default();
        let rx = connectivity.subscribe();
        assert_eq!(connectivity.subscriber_count(), 1);
        drop(rx);
        assert_eq!(connectivity.subscriber_count(), 0);
    }
}
