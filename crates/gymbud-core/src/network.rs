//! Connectivity probe shared by the history views.

use tokio::sync::watch;

/// Writer side, owned by whatever observes the platform network state.
#[derive(Debug)]
pub struct NetworkMonitor {
    tx: watch::Sender<bool>,
}

/// Cheap, cloneable reader side.
#[derive(Debug, Clone)]
pub struct NetworkStatus {
    rx: watch::Receiver<bool>,
    last_seen: bool,
}

impl NetworkMonitor {
    pub fn new(online: bool) -> (Self, NetworkStatus) {
        let (tx, rx) = watch::channel(online);
        (
            Self { tx },
            NetworkStatus {
                rx,
                last_seen: online,
            },
        )
    }

    /// Publish a new state. Repeating the current state wakes nobody.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                tracing::debug!("network: {}", if online { "online" } else { "offline" });
                *current = online;
                true
            }
        });
    }

    pub fn status(&self) -> NetworkStatus {
        let rx = self.tx.subscribe();
        let last_seen = *rx.borrow();
        NetworkStatus { rx, last_seen }
    }
}

impl NetworkStatus {
    /// A status that never changes.
    pub fn fixed(online: bool) -> Self {
        let (_tx, rx) = watch::channel(online);
        Self {
            rx,
            last_seen: online,
        }
    }

    /// A reader that only reports transitions from now on.
    pub fn subscribe(&self) -> Self {
        let mut rx = self.rx.clone();
        let last_seen = *rx.borrow_and_update();
        Self { rx, last_seen }
    }

    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the next offline → online transition.
    ///
    /// Returns `false` once the monitor is gone.
    pub async fn came_online(&mut self) -> bool {
        loop {
            if self.rx.changed().await.is_err() {
                return false;
            }
            let online = *self.rx.borrow_and_update();
            let was_online = std::mem::replace(&mut self.last_seen, online);
            if online && !was_online {
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn came_online_fires_on_transition_only() {
        let (monitor, status) = NetworkMonitor::new(false);
        let mut watcher = status.clone();

        let waiter = tokio::spawn(async move { watcher.came_online().await });
        monitor.set_online(false);
        monitor.set_online(true);

        let fired = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(fired);
        assert!(status.is_online());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn came_online_ends_when_monitor_dropped() {
        let mut status = NetworkStatus::fixed(true);
        assert!(status.is_online());
        assert!(!status.came_online().await);
    }
}
