//! Shared fixtures for portal integration tests.

// Each test binary uses a different subset of these.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use fieldsync::{
    DrainPolicy, MonitorConfig, PendingMutation, PortalConfig, RemoteError, RemoteStore,
    RetryPolicy, SyncConfig,
};

/// Remote store that replays scripted apply outcomes and records every
/// call. Once the script runs out, applies succeed with a generated id.
pub struct ScriptedRemote {
    outcomes: Mutex<VecDeque<Result<Value, RemoteError>>>,
    applied: Mutex<Vec<PendingMutation>>,
    records: Value,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::with_outcomes(vec![])
    }

    pub fn with_outcomes(outcomes: Vec<Result<Value, RemoteError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            applied: Mutex::new(Vec::new()),
            records: json!([]),
        }
    }

    pub fn with_records(records: Value) -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            applied: Mutex::new(Vec::new()),
            records,
        }
    }

    pub fn applied(&self) -> Vec<PendingMutation> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStore for ScriptedRemote {
    async fn apply(&self, mutation: &PendingMutation) -> Result<Value, RemoteError> {
        let outcome = self
            .outcomes
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
        Ok(self.records.clone())
    }
}

/// Portal config with a short debounce and no retry delays, so tests run
/// in milliseconds of wall time.
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

/// Poll `cond` until it holds or five seconds pass.
pub async fn wait_until<F, Fut>(what: &str, mut cond: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
