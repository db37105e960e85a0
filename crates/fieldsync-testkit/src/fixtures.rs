//! Deterministic fixtures for fieldsync tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use fieldsync::{Portal, PortalConfig};
use fieldsync_core::{Clock, PendingMutation, RemoteError};
use fieldsync_store::MemoryKv;
use fieldsync_sync::{
    ConnectivityProbe, DrainPolicy, MonitorConfig, RemoteStore, RetryPolicy, SyncConfig,
};

/// Hand-cranked clock so staleness tests never race wall time.
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn at(now_millis: i64) -> Self {
        Self(AtomicI64::new(now_millis))
    }

    pub fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Probe with a fixed answer.
pub struct StaticProbe(pub bool);

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_reachable(&self) -> bool {
        self.0
    }
}

/// Remote store that replays scripted apply outcomes and records every
/// successful application. Once the script runs out, applies succeed
/// with a generated server id and fetches return the configured records.
pub struct ScriptedRemote {
    apply_outcomes: Mutex<VecDeque<Result<Value, RemoteError>>>,
    applied: Mutex<Vec<PendingMutation>>,
    records: Mutex<Value>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self {
            apply_outcomes: Mutex::new(VecDeque::new()),
            applied: Mutex::new(Vec::new()),
            records: Mutex::new(json!([])),
        }
    }

    /// Queue outcomes for the next apply calls, oldest first.
    pub fn script_applies(&self, outcomes: Vec<Result<Value, RemoteError>>) {
        self.apply_outcomes.lock().unwrap().extend(outcomes);
    }

    /// Set what fetches return.
    pub fn set_records(&self, records: Value) {
        *self.records.lock().unwrap() = records;
    }

    /// Mutations the remote has accepted, in delivery order.
    pub fn applied(&self) -> Vec<PendingMutation> {
        self.applied.lock().unwrap().clone()
    }
}

impl Default for ScriptedRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for ScriptedRemote {
    async fn apply(&self, mutation: &PendingMutation) -> Result<Value, RemoteError> {
        let outcome = self
            .apply_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(json!({"id": format!("srv-{}", mutation.id)})));
        if outcome.is_ok() {
            self.applied.lock().unwrap().push(mutation.clone());
        }
        outcome
    }

    async fn fetch(&self, _resource: &str, _query: Option<Value>) -> Result<Value, RemoteError> {
        Ok(self.records.lock().unwrap().clone())
    }
}

/// Portal config tuned for tests: tiny debounce, no retry delays.
pub fn fast_config(initial_online: bool) -> PortalConfig {
    PortalConfig {
        default_ttl: Duration::from_secs(60),
        max_retries: 2,
        monitor: MonitorConfig {
            debounce: Duration::from_millis(10),
            initial_online,
        },
        sync: SyncConfig {
            retry: RetryPolicy::none(),
            drain: DrainPolicy::Block,
        },
    }
}

/// In-memory portal over a [`ScriptedRemote`], plus a handle to the
/// remote for scripting and inspection.
pub async fn memory_portal(
    initial_online: bool,
) -> (Portal<MemoryKv, Arc<ScriptedRemote>>, Arc<ScriptedRemote>) {
    let remote = Arc::new(ScriptedRemote::new());
    let portal = Portal::new(
        MemoryKv::new(),
        Arc::clone(&remote),
        fast_config(initial_online),
    )
    .await;
    (portal, remote)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_when_cranked() {
        let clock = ManualClock::at(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        clock.advance(250);
        assert_eq!(clock.now_millis(), 1_250);
    }

    #[tokio::test]
    async fn scripted_remote_replays_in_order_then_defaults() {
        let remote = ScriptedRemote::new();
        remote.script_applies(vec![
            Err(RemoteError::Timeout("first".into())),
            Ok(json!({"id": "wo-1"})),
        ]);

        let m = PendingMutation::new(
            fieldsync_core::MutationKind::Insert,
            "work_orders",
            json!({}),
            3,
            0,
        );
        assert!(remote.apply(&m).await.is_err());
        assert_eq!(remote.apply(&m).await.unwrap()["id"], "wo-1");
        // Script exhausted: generated id.
        assert!(remote.apply(&m).await.is_ok());
        assert_eq!(remote.applied().len(), 2);
    }

    #[tokio::test]
    async fn memory_portal_round_trips_a_write() {
        let (portal, remote) = memory_portal(false).await;
        portal
            .insert("work_orders", json!({"title": "fix pump"}))
            .await
            .unwrap();

        portal.report_connectivity(true);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while portal.status().await.pending_mutations > 0 {
            assert!(tokio::time::Instant::now() < deadline);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(remote.applied().len(), 1);
    }
}
