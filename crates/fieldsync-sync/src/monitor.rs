//! Debounced connectivity state.
//!
//! Platform shells report raw reachability changes here; consumers see a
//! debounced signal that only flips after the raw state has held for a
//! stability window. Cellular handoffs and elevator rides flap the raw
//! signal several times a second, and reacting to every flap would fire a
//! drain (and cancel it, and fire it again) for nothing.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

/// Answers "can we reach the backend right now". Implemented by the host
/// platform; the monitor never probes on its own.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Tuning for [`NetworkMonitor`].
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// How long the raw state must hold before the debounced state flips.
    pub debounce: Duration,
    /// Connectivity assumed before the first report arrives.
    pub initial_online: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(750),
            initial_online: false,
        }
    }
}

/// Debounced view over raw connectivity reports.
///
/// `report` is cheap and safe to call from anywhere; the debouncing runs
/// in a background task that exits when the monitor is dropped.
pub struct NetworkMonitor {
    raw_tx: watch::Sender<bool>,
    debounced_rx: watch::Receiver<bool>,
}

impl NetworkMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        let (raw_tx, raw_rx) = watch::channel(config.initial_online);
        let (debounced_tx, debounced_rx) = watch::channel(config.initial_online);

        tokio::spawn(debounce_loop(raw_rx, debounced_tx, config.debounce));

        Self {
            raw_tx,
            debounced_rx,
        }
    }

    /// Feed a raw reachability observation in.
    pub fn report(&self, online: bool) {
        // Send unconditionally; the debounce loop coalesces.
        let _ = self.raw_tx.send(online);
    }

    /// Ask `probe` and feed the answer in as a raw observation. Used on
    /// app foregrounding, where the platform's cached state may be old.
    pub async fn refresh_from(&self, probe: &dyn ConnectivityProbe) -> bool {
        let online = probe.is_reachable().await;
        self.report(online);
        online
    }

    /// Current debounced state.
    pub fn is_online(&self) -> bool {
        *self.debounced_rx.borrow()
    }

    /// Subscribe to debounced transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.debounced_rx.clone()
    }
}

/// Propagate raw changes only once they have been stable for `debounce`.
async fn debounce_loop(
    mut raw_rx: watch::Receiver<bool>,
    debounced_tx: watch::Sender<bool>,
    debounce: Duration,
) {
    while raw_rx.changed().await.is_ok() {
        let mut candidate = *raw_rx.borrow_and_update();

        // Restart the window on every flap; settle on the last value.
        loop {
            match tokio::time::timeout(debounce, raw_rx.changed()).await {
                Ok(Ok(())) => candidate = *raw_rx.borrow_and_update(),
                Ok(Err(_)) => return,
                Err(_) => break,
            }
        }

        if *debounced_tx.borrow() != candidate {
            tracing::info!(online = candidate, "connectivity changed");
            if debounced_tx.send(candidate).is_err() {
                return;
            }
        }
    }
}
