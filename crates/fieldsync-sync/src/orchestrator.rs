//! The sync orchestrator: single-flight FIFO queue drain.

use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};

use fieldsync_cache::CacheManager;
use fieldsync_core::PendingMutation;
use fieldsync_queue::{FailureOutcome, MutationQueue};
use fieldsync_store::KvStore;

use crate::backoff::RetryPolicy;
use crate::events::QueueEvent;
use crate::remote::RemoteStore;

/// Capacity of the queue-event broadcast.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What the drain does when the mutation at the queue head is
/// dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainPolicy {
    /// Stop. Later mutations may depend on the parked one (an update to a
    /// record whose insert never landed), so draining past it risks
    /// ordering bugs. The user must retry or discard to unblock.
    #[default]
    Block,
    /// Drain the rest of the queue around dead-lettered entries. For
    /// deployments whose mutations are known to be independent.
    SkipDeadLettered,
}

/// Tuning for [`SyncOrchestrator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncConfig {
    pub retry: RetryPolicy,
    pub drain: DrainPolicy,
}

/// Coarse orchestrator state for status UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
}

/// Outcome summary of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Mutations confirmed by the remote store.
    pub applied: usize,
    /// Redelivery attempts made after retriable failures.
    pub retried: usize,
    /// Mutations parked during this drain.
    pub dead_lettered: usize,
    /// Queue length when the drain ended, dead-lettered included.
    pub remaining: usize,
}

/// Drains the mutation queue against the remote store, oldest first.
///
/// At most one drain runs at a time. A `sync_now` call that finds a drain
/// in flight does not start another; it waits and returns that drain's
/// report, so a burst of triggers (reconnect, foreground, manual refresh)
/// collapses into one pass over the queue.
pub struct SyncOrchestrator<S, R> {
    queue: Arc<MutationQueue<S>>,
    cache: Arc<CacheManager<S>>,
    remote: Arc<R>,
    online: watch::Receiver<bool>,
    config: SyncConfig,
    drain_lock: Mutex<()>,
    state_tx: watch::Sender<SyncState>,
    report_tx: watch::Sender<Option<SyncReport>>,
    events_tx: broadcast::Sender<QueueEvent>,
}

enum Flow {
    Continue,
    Stop,
}

impl<S, R> SyncOrchestrator<S, R>
where
    S: KvStore + 'static,
    R: RemoteStore + 'static,
{
    pub fn new(
        queue: Arc<MutationQueue<S>>,
        cache: Arc<CacheManager<S>>,
        remote: Arc<R>,
        online: watch::Receiver<bool>,
        config: SyncConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(SyncState::Idle);
        let (report_tx, _) = watch::channel(None);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            queue,
            cache,
            remote,
            online,
            config,
            drain_lock: Mutex::new(()),
            state_tx,
            report_tx,
            events_tx,
        }
    }

    /// Debounced connectivity as the orchestrator sees it.
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Observe drain starts and finishes.
    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state_tx.subscribe()
    }

    /// Report of the most recently completed drain, if any.
    pub fn last_report(&self) -> Option<SyncReport> {
        self.report_tx.borrow().clone()
    }

    /// Subscribe to per-mutation lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<QueueEvent> {
        self.events_tx.subscribe()
    }

    /// Drain the queue now, or join the drain already in flight.
    pub async fn sync_now(&self) -> SyncReport {
        let mut reports = self.report_tx.subscribe();
        match self.drain_lock.try_lock() {
            Ok(guard) => {
                let _ = self.state_tx.send(SyncState::Syncing);
                let report = self.drain().await;
                let _ = self.state_tx.send(SyncState::Idle);
                // Release before publishing, so a joiner that failed
                // try_lock is guaranteed to see this send.
                drop(guard);
                let _ = self.report_tx.send(Some(report.clone()));
                report
            }
            Err(_) => {
                tracing::debug!("sync already in flight, joining it");
                if reports.changed().await.is_ok() {
                    reports.borrow().clone().unwrap_or_default()
                } else {
                    SyncReport::default()
                }
            }
        }
    }

    /// Drain when connectivity comes back. The task ends when the
    /// connectivity sender is dropped.
    pub fn spawn_reconnect_trigger(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        let mut online = orchestrator.online.clone();
        tokio::spawn(async move {
            let mut was_online = *online.borrow();
            while online.changed().await.is_ok() {
                let now_online = *online.borrow_and_update();
                if now_online && !was_online {
                    tracing::info!("connectivity restored, draining mutation queue");
                    let _ = orchestrator.sync_now().await;
                }
                was_online = now_online;
            }
        })
    }

    async fn drain(&self) -> SyncReport {
        let mut report = SyncReport::default();
        loop {
            if !self.is_online() {
                break;
            }
            let head = match self.config.drain {
                DrainPolicy::Block => match self.queue.peek().await {
                    Some(m) if m.dead_lettered => {
                        tracing::warn!(
                            id = %m.id,
                            resource = %m.resource,
                            "dead-lettered mutation at queue head, drain blocked"
                        );
                        break;
                    }
                    other => other,
                },
                DrainPolicy::SkipDeadLettered => self.queue.peek_active().await,
            };
            let Some(mutation) = head else { break };
            match self.deliver(mutation, &mut report).await {
                Flow::Continue => {}
                Flow::Stop => break,
            }
        }
        report.remaining = self.queue.pending_count().await;
        report
    }

    /// Deliver one mutation, retrying in place on retriable failures
    /// until it is applied, dead-lettered, or the drain has to stop.
    async fn deliver(&self, mut mutation: PendingMutation, report: &mut SyncReport) -> Flow {
        loop {
            let err = match self.remote.apply(&mutation).await {
                Ok(record) => {
                    if let Err(e) = self.queue.remove(&mutation.id).await {
                        tracing::error!(id = %mutation.id, error = %e, "applied mutation could not be removed");
                        return Flow::Stop;
                    }
                    // Cached reads over this resource are now out of date.
                    self.cache.invalidate_prefix(&mutation.resource).await;
                    report.applied += 1;
                    tracing::info!(id = %mutation.id, resource = %mutation.resource, "mutation applied");
                    let _ = self.events_tx.send(QueueEvent::Applied {
                        mutation_id: mutation.id.clone(),
                        resource: mutation.resource.clone(),
                        temp_id: mutation.temp_id().map(str::to_owned),
                        record,
                    });
                    return Flow::Continue;
                }
                Err(err) => err,
            };

            if !err.is_retriable() {
                if let Err(e) = self.queue.dead_letter(&mutation.id, &err.to_string()).await {
                    tracing::error!(id = %mutation.id, error = %e, "could not dead-letter mutation");
                    return Flow::Stop;
                }
                report.dead_lettered += 1;
                tracing::warn!(id = %mutation.id, error = %err, "terminal failure, mutation dead-lettered");
                let _ = self.events_tx.send(QueueEvent::DeadLettered {
                    mutation_id: mutation.id.clone(),
                    resource: mutation.resource.clone(),
                    error: err.to_string(),
                });
                return Flow::Continue;
            }

            match self
                .queue
                .record_retriable_failure(&mutation.id, &err.to_string())
                .await
            {
                Ok(FailureOutcome::DeadLettered) => {
                    report.dead_lettered += 1;
                    tracing::warn!(id = %mutation.id, error = %err, "retries exhausted, mutation dead-lettered");
                    let _ = self.events_tx.send(QueueEvent::DeadLettered {
                        mutation_id: mutation.id.clone(),
                        resource: mutation.resource.clone(),
                        error: err.to_string(),
                    });
                    return Flow::Continue;
                }
                Ok(FailureOutcome::Requeued { retry_count }) => {
                    report.retried += 1;
                    mutation.retry_count = retry_count;
                    mutation.last_error = Some(err.to_string());
                    tracing::debug!(id = %mutation.id, retry_count, error = %err, "retriable failure, will redeliver");
                    let _ = self.events_tx.send(QueueEvent::Requeued {
                        mutation_id: mutation.id.clone(),
                        resource: mutation.resource.clone(),
                        retry_count,
                        error: err.to_string(),
                    });
                    // Went offline mid-drain: the mutation stays queued
                    // for the reconnect trigger.
                    if !self.is_online() {
                        return Flow::Stop;
                    }
                    let delay = self.config.retry.delay_for(retry_count);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    if !self.is_online() {
                        return Flow::Stop;
                    }
                }
                Err(e) => {
                    tracing::error!(id = %mutation.id, error = %e, "could not record failure");
                    return Flow::Stop;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fieldsync_core::{Clock, MutationKind, RemoteError, SystemClock};
    use fieldsync_store::MemoryKv;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct ScriptedRemote {
        outcomes: StdMutex<VecDeque<Result<serde_json::Value, RemoteError>>>,
        calls: StdMutex<Vec<String>>,
    }

    impl ScriptedRemote {
        fn new(outcomes: Vec<Result<serde_json::Value, RemoteError>>) -> Self {
            Self {
                outcomes: StdMutex::new(outcomes.into()),
                calls: StdMutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteStore for ScriptedRemote {
        async fn apply(
            &self,
            mutation: &PendingMutation,
        ) -> Result<serde_json::Value, RemoteError> {
            self.calls.lock().unwrap().push(mutation.id.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(json!({"id": "srv-1"})))
        }

        async fn fetch(
            &self,
            _resource: &str,
            _query: Option<serde_json::Value>,
        ) -> Result<serde_json::Value, RemoteError> {
            Ok(json!([]))
        }
    }

    struct Harness<R> {
        queue: Arc<MutationQueue<MemoryKv>>,
        cache: Arc<CacheManager<MemoryKv>>,
        remote: Arc<R>,
        orchestrator: Arc<SyncOrchestrator<MemoryKv, R>>,
        online_tx: watch::Sender<bool>,
    }

    async fn harness<R: RemoteStore + 'static>(
        remote: R,
        online: bool,
        config: SyncConfig,
    ) -> Harness<R> {
        let store = Arc::new(MemoryKv::new());
        let clock = Arc::new(SystemClock);
        let (online_tx, online_rx) = watch::channel(online);
        let queue = Arc::new(
            MutationQueue::load(Arc::clone(&store), Arc::clone(&clock) as Arc<dyn Clock>).await,
        );
        let cache = Arc::new(CacheManager::new(
            Arc::clone(&store),
            clock as Arc<dyn Clock>,
            online_rx.clone(),
        ));
        let remote = Arc::new(remote);
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::clone(&queue),
            Arc::clone(&cache),
            Arc::clone(&remote),
            online_rx,
            config,
        ));
        Harness {
            queue,
            cache,
            remote,
            orchestrator,
            online_tx,
        }
    }

    fn no_retry_config() -> SyncConfig {
        SyncConfig {
            retry: RetryPolicy::none(),
            drain: DrainPolicy::Block,
        }
    }

    #[tokio::test]
    async fn drains_fifo_and_invalidates_the_mutated_resource() {
        let h = harness(ScriptedRemote::new(vec![]), true, no_retry_config()).await;

        // Warm the cache for both resources.
        h.cache
            .read("work_orders:list", Duration::from_secs(60), || async {
                Ok::<_, RemoteError>(json!([{"id": "wo-1"}]))
            })
            .await;
        h.cache
            .read("tasks:list", Duration::from_secs(60), || async {
                Ok::<_, RemoteError>(json!([]))
            })
            .await;

        let a = h
            .queue
            .enqueue(
                MutationKind::Insert,
                "work_orders",
                json!({"tempId": "tmp-1", "title": "fix pump"}),
                3,
            )
            .await
            .unwrap();
        let b = h
            .queue
            .enqueue(MutationKind::Update, "work_orders", json!({"id": "wo-1"}), 3)
            .await
            .unwrap();

        let mut events = h.orchestrator.subscribe_events();
        let report = h.orchestrator.sync_now().await;

        assert_eq!(report.applied, 2);
        assert_eq!(report.retried, 0);
        assert_eq!(report.remaining, 0);
        assert_eq!(h.remote.calls(), vec![a.id.clone(), b.id]);

        // First event carries the temp id from the insert payload.
        match events.recv().await.unwrap() {
            QueueEvent::Applied {
                mutation_id,
                temp_id,
                ..
            } => {
                assert_eq!(mutation_id, a.id);
                assert_eq!(temp_id.as_deref(), Some("tmp-1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // The mutated resource was invalidated; the other one kept.
        let gone = h
            .cache
            .read("work_orders:list", Duration::from_secs(60), || async {
                Ok::<_, RemoteError>(json!([{"id": "wo-1"}, {"id": "wo-2"}]))
            })
            .await;
        assert!(!gone.is_from_cache);
        let kept = h
            .cache
            .read("tasks:list", Duration::from_secs(60), || async {
                Ok::<_, RemoteError>(json!([]))
            })
            .await;
        assert!(kept.is_from_cache);
    }

    #[tokio::test]
    async fn retries_in_place_until_success() {
        let server_error = RemoteError::Server {
            status: 503,
            message: "unavailable".into(),
        };
        let h = harness(
            ScriptedRemote::new(vec![
                Err(server_error.clone()),
                Err(server_error),
                Ok(json!({"id": "srv-9"})),
            ]),
            true,
            no_retry_config(),
        )
        .await;

        let m = h
            .queue
            .enqueue(MutationKind::Insert, "work_orders", json!({}), 2)
            .await
            .unwrap();

        let report = h.orchestrator.sync_now().await;
        assert_eq!(report.applied, 1);
        assert_eq!(report.retried, 2);
        assert_eq!(report.dead_lettered, 0);
        assert_eq!(report.remaining, 0);
        assert_eq!(h.remote.calls().len(), 3);
        assert_eq!(h.remote.calls()[0], m.id);
    }

    #[tokio::test]
    async fn exhausted_budget_dead_letters_and_blocks_the_drain() {
        let server_error = RemoteError::Server {
            status: 503,
            message: "unavailable".into(),
        };
        let h = harness(
            ScriptedRemote::new(vec![Err(server_error.clone()), Err(server_error)]),
            true,
            no_retry_config(),
        )
        .await;

        let doomed = h
            .queue
            .enqueue(MutationKind::Insert, "work_orders", json!({}), 1)
            .await
            .unwrap();
        h.queue
            .enqueue(MutationKind::Update, "tasks", json!({}), 3)
            .await
            .unwrap();

        let report = h.orchestrator.sync_now().await;
        assert_eq!(report.applied, 0);
        assert_eq!(report.retried, 1);
        assert_eq!(report.dead_lettered, 1);
        assert_eq!(report.remaining, 2);
        // Two deliveries of the doomed mutation, none of the one behind it.
        assert_eq!(h.remote.calls(), vec![doomed.id.clone(), doomed.id.clone()]);

        let parked = h.queue.peek().await.unwrap();
        assert_eq!(parked.id, doomed.id);
        assert!(parked.dead_lettered);
    }

    #[tokio::test]
    async fn skip_policy_drains_around_dead_letters() {
        let server_error = RemoteError::Server {
            status: 503,
            message: "unavailable".into(),
        };
        let h = harness(
            ScriptedRemote::new(vec![
                Err(server_error.clone()),
                Err(server_error),
                Ok(json!({"id": "srv-2"})),
            ]),
            true,
            SyncConfig {
                retry: RetryPolicy::none(),
                drain: DrainPolicy::SkipDeadLettered,
            },
        )
        .await;

        h.queue
            .enqueue(MutationKind::Insert, "work_orders", json!({}), 1)
            .await
            .unwrap();
        let healthy = h
            .queue
            .enqueue(MutationKind::Update, "tasks", json!({}), 3)
            .await
            .unwrap();

        let report = h.orchestrator.sync_now().await;
        assert_eq!(report.applied, 1);
        assert_eq!(report.dead_lettered, 1);
        assert_eq!(report.remaining, 1);
        assert_eq!(h.remote.calls().last(), Some(&healthy.id));
    }

    #[tokio::test]
    async fn terminal_failure_dead_letters_without_retrying() {
        let h = harness(
            ScriptedRemote::new(vec![Err(RemoteError::Rejected {
                status: 422,
                message: "missing field".into(),
            })]),
            true,
            no_retry_config(),
        )
        .await;

        let m = h
            .queue
            .enqueue(MutationKind::Insert, "work_orders", json!({}), 3)
            .await
            .unwrap();

        let mut events = h.orchestrator.subscribe_events();
        let report = h.orchestrator.sync_now().await;
        assert_eq!(report.retried, 0);
        assert_eq!(report.dead_lettered, 1);
        assert_eq!(h.remote.calls().len(), 1);

        match events.recv().await.unwrap() {
            QueueEvent::DeadLettered {
                mutation_id, error, ..
            } => {
                assert_eq!(mutation_id, m.id);
                assert!(error.contains("422"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn offline_sync_attempts_nothing() {
        let h = harness(ScriptedRemote::new(vec![]), false, no_retry_config()).await;
        h.queue
            .enqueue(MutationKind::Insert, "work_orders", json!({}), 3)
            .await
            .unwrap();

        let report = h.orchestrator.sync_now().await;
        assert_eq!(report.applied, 0);
        assert_eq!(report.remaining, 1);
        assert!(h.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn going_offline_mid_drain_stops_after_the_failure() {
        struct DroppingRemote {
            online_tx: watch::Sender<bool>,
            calls: StdMutex<usize>,
        }

        #[async_trait]
        impl RemoteStore for DroppingRemote {
            async fn apply(
                &self,
                _mutation: &PendingMutation,
            ) -> Result<serde_json::Value, RemoteError> {
                *self.calls.lock().unwrap() += 1;
                // Connectivity drops as this request fails.
                let _ = self.online_tx.send(false);
                Err(RemoteError::Unreachable("link lost".into()))
            }

            async fn fetch(
                &self,
                _resource: &str,
                _query: Option<serde_json::Value>,
            ) -> Result<serde_json::Value, RemoteError> {
                Err(RemoteError::Unreachable("link lost".into()))
            }
        }

        let (online_tx, online_rx) = watch::channel(true);
        let store = Arc::new(MemoryKv::new());
        let clock = Arc::new(SystemClock) as Arc<dyn Clock>;
        let queue = Arc::new(MutationQueue::load(Arc::clone(&store), Arc::clone(&clock)).await);
        let cache = Arc::new(CacheManager::new(
            Arc::clone(&store),
            clock,
            online_rx.clone(),
        ));
        let remote = Arc::new(DroppingRemote {
            online_tx,
            calls: StdMutex::new(0),
        });
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&queue),
            cache,
            Arc::clone(&remote),
            online_rx,
            no_retry_config(),
        );

        queue
            .enqueue(MutationKind::Insert, "work_orders", json!({}), 5)
            .await
            .unwrap();

        let report = orchestrator.sync_now().await;
        assert_eq!(report.retried, 1);
        assert_eq!(report.remaining, 1);
        assert_eq!(*remote.calls.lock().unwrap(), 1);
        // Still queued with the failure recorded, not dead-lettered.
        let head = queue.peek().await.unwrap();
        assert_eq!(head.retry_count, 1);
        assert!(!head.dead_lettered);
    }

    #[tokio::test]
    async fn concurrent_sync_now_joins_the_in_flight_drain() {
        struct GatedRemote {
            gate: tokio::sync::Notify,
            calls: StdMutex<usize>,
        }

        #[async_trait]
        impl RemoteStore for GatedRemote {
            async fn apply(
                &self,
                _mutation: &PendingMutation,
            ) -> Result<serde_json::Value, RemoteError> {
                *self.calls.lock().unwrap() += 1;
                self.gate.notified().await;
                Ok(json!({"id": "srv-1"}))
            }

            async fn fetch(
                &self,
                _resource: &str,
                _query: Option<serde_json::Value>,
            ) -> Result<serde_json::Value, RemoteError> {
                Ok(json!([]))
            }
        }

        let h = harness(
            GatedRemote {
                gate: tokio::sync::Notify::new(),
                calls: StdMutex::new(0),
            },
            true,
            no_retry_config(),
        )
        .await;

        h.queue
            .enqueue(MutationKind::Insert, "work_orders", json!({}), 3)
            .await
            .unwrap();

        let first = tokio::spawn({
            let orchestrator = Arc::clone(&h.orchestrator);
            async move { orchestrator.sync_now().await }
        });
        // Let the first drain reach the gated remote call.
        while *h.remote.calls.lock().unwrap() == 0 {
            tokio::task::yield_now().await;
        }

        let second = tokio::spawn({
            let orchestrator = Arc::clone(&h.orchestrator);
            async move { orchestrator.sync_now().await }
        });
        tokio::task::yield_now().await;
        h.remote.gate.notify_one();

        let first = first.await.unwrap();
        let second = second.await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.applied, 1);
        assert_eq!(*h.remote.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn reconnect_trigger_drains_the_backlog() {
        let h = harness(ScriptedRemote::new(vec![]), false, no_retry_config()).await;
        h.queue
            .enqueue(MutationKind::Insert, "work_orders", json!({}), 3)
            .await
            .unwrap();
        let _trigger = h.orchestrator.spawn_reconnect_trigger();

        h.online_tx.send(true).unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while h.queue.pending_count().await > 0 {
            assert!(
                tokio::time::Instant::now() < deadline,
                "queue should drain after reconnect"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.remote.calls().len(), 1);
    }
}
