//! The portal: unified API over cache, queue, and sync.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use fieldsync_cache::{CacheManager, CacheRead};
use fieldsync_core::{Clock, MutationKind, PendingMutation, SystemClock};
use fieldsync_queue::MutationQueue;
use fieldsync_store::KvStore;
use fieldsync_sync::{
    ConnectivityProbe, MonitorConfig, NetworkMonitor, QueueEvent, RemoteStore, SyncConfig,
    SyncOrchestrator, SyncReport, SyncState,
};

use crate::binding::{overlay, ResourceView, TempIdMap};
use crate::error::Result;

/// Configuration for a [`Portal`].
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Freshness window for cached reads that do not name their own.
    pub default_ttl: Duration,
    /// Retry budget given to each enqueued mutation.
    pub max_retries: u32,
    /// Connectivity debouncing.
    pub monitor: MonitorConfig,
    /// Drain behavior.
    pub sync: SyncConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            max_retries: 3,
            monitor: MonitorConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

/// Point-in-time snapshot for status UI.
#[derive(Debug, Clone)]
pub struct PortalStatus {
    pub online: bool,
    pub syncing: bool,
    /// Queued mutations, dead-lettered included.
    pub pending_mutations: usize,
    /// Mutations parked for user attention.
    pub dead_lettered: usize,
    /// Report of the most recently completed drain.
    pub last_report: Option<SyncReport>,
}

/// The main portal struct.
///
/// Provides a unified offline-first API for:
/// - Reading resources (cache-first, stale-while-revalidate)
/// - Writing through the durable mutation queue
/// - Binding views with optimistic overlays
/// - Observing connectivity, sync, and queue state
///
/// Dropping the portal stops its background tasks; the store keeps every
/// cached entry and queued mutation for the next session.
pub struct Portal<S: KvStore, R: RemoteStore> {
    cache: Arc<CacheManager<S>>,
    queue: Arc<MutationQueue<S>>,
    remote: Arc<R>,
    monitor: Arc<NetworkMonitor>,
    orchestrator: Arc<SyncOrchestrator<S, R>>,
    temp_ids: Arc<TempIdMap>,
    config: PortalConfig,
    tasks: Vec<JoinHandle<()>>,
}

impl<S, R> Portal<S, R>
where
    S: KvStore + 'static,
    R: RemoteStore + 'static,
{
    /// Open a portal over `store`, syncing against `remote`.
    ///
    /// Reloads whatever the previous session left queued.
    pub async fn new(store: S, remote: R, config: PortalConfig) -> Self {
        let store = Arc::new(store);
        let remote = Arc::new(remote);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let monitor = Arc::new(NetworkMonitor::new(config.monitor));
        let online = monitor.subscribe();
        let cache = Arc::new(CacheManager::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            online.clone(),
        ));
        let queue = Arc::new(MutationQueue::load(store, clock).await);
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::clone(&queue),
            Arc::clone(&cache),
            Arc::clone(&remote),
            online,
            config.sync,
        ));

        let temp_ids = Arc::new(TempIdMap::new());
        let tasks = vec![
            orchestrator.spawn_reconnect_trigger(),
            spawn_temp_id_resolver(orchestrator.subscribe_events(), Arc::clone(&temp_ids)),
        ];

        Self {
            cache,
            queue,
            remote,
            monitor,
            orchestrator,
            temp_ids,
            config,
            tasks,
        }
    }

    /// The underlying cache, for screens that need a custom key or
    /// fetcher instead of the resource-level [`read`](Self::read).
    pub fn cache(&self) -> &CacheManager<S> {
        &self.cache
    }

    /// The underlying mutation queue.
    pub fn queue(&self) -> &MutationQueue<S> {
        &self.queue
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Cache-first read of a resource with the default TTL.
    pub async fn read(&self, resource: &str, query: Option<Value>) -> CacheRead<Value> {
        self.read_with_ttl(resource, query, self.config.default_ttl)
            .await
    }

    /// Cache-first read with an explicit freshness window.
    pub async fn read_with_ttl(
        &self,
        resource: &str,
        query: Option<Value>,
        ttl: Duration,
    ) -> CacheRead<Value> {
        let key = read_key(resource, query.as_ref());
        let remote = Arc::clone(&self.remote);
        let resource = resource.to_string();
        self.cache
            .read(&key, ttl, move || async move {
                remote.fetch(&resource, query).await
            })
            .await
    }

    /// Read a resource and overlay its queued mutations, for direct
    /// consumption by a list screen.
    pub async fn bind(&self, resource: &str, query: Option<Value>) -> ResourceView {
        let read = self.read(resource, query).await;
        let mutations: Vec<PendingMutation> = self
            .queue
            .mutations()
            .await
            .into_iter()
            .filter(|m| m.resource == resource)
            .collect();
        ResourceView {
            records: overlay(read.data.as_ref(), &mutations),
            is_from_cache: read.is_from_cache,
            is_stale: read.is_stale,
            loading: false,
        }
    }

    /// Drop cached entries for one resource so the next read refetches.
    pub async fn invalidate(&self, resource: &str) {
        self.cache.invalidate_prefix(resource).await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Queue an insert. A `tempId` is added to the payload if the caller
    /// did not supply one, so the optimistic row has an identity.
    pub async fn insert(&self, resource: &str, mut payload: Value) -> Result<PendingMutation> {
        if let Value::Object(fields) = &mut payload {
            fields
                .entry("tempId")
                .or_insert_with(|| Value::String(format!("tmp-{}", uuid::Uuid::new_v4())));
        }
        self.mutate(MutationKind::Insert, resource, payload).await
    }

    /// Queue an update to the record named by `payload["id"]`.
    pub async fn update(&self, resource: &str, payload: Value) -> Result<PendingMutation> {
        self.mutate(MutationKind::Update, resource, payload).await
    }

    /// Queue a delete of the record named by `payload["id"]`.
    pub async fn delete(&self, resource: &str, payload: Value) -> Result<PendingMutation> {
        self.mutate(MutationKind::Delete, resource, payload).await
    }

    /// Queue a mutation with the configured default retry budget.
    pub async fn mutate(
        &self,
        kind: MutationKind,
        resource: &str,
        payload: Value,
    ) -> Result<PendingMutation> {
        self.mutate_with_retries(kind, resource, payload, self.config.max_retries)
            .await
    }

    /// Queue a mutation with an explicit retry budget. Call sites choose:
    /// a cheap status toggle can afford fewer retries than a record
    /// creation carrying user-entered work.
    ///
    /// Always durable-first: the write lands in the queue and returns,
    /// and a drain is kicked off in the background if we are online. The
    /// network is never on this call path.
    pub async fn mutate_with_retries(
        &self,
        kind: MutationKind,
        resource: &str,
        payload: Value,
        max_retries: u32,
    ) -> Result<PendingMutation> {
        let mutation = self
            .queue
            .enqueue(kind, resource, payload, max_retries)
            .await?;
        if self.monitor.is_online() {
            let orchestrator = Arc::clone(&self.orchestrator);
            tokio::spawn(async move {
                let _ = orchestrator.sync_now().await;
            });
        }
        Ok(mutation)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Drain the queue now, or join the drain already in flight.
    pub async fn sync_now(&self) -> SyncReport {
        self.orchestrator.sync_now().await
    }

    /// App came to the foreground: the platform's cached connectivity may
    /// be stale, so probe it fresh, then drain whatever accumulated.
    pub async fn on_foreground(&self, probe: &dyn ConnectivityProbe) -> SyncReport {
        self.monitor.refresh_from(probe).await;
        self.orchestrator.sync_now().await
    }

    /// Feed a raw connectivity observation from the host platform.
    pub fn report_connectivity(&self, online: bool) {
        self.monitor.report(online);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dead Letter Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Mutations parked for user attention.
    pub async fn dead_letters(&self) -> Vec<PendingMutation> {
        self.queue.dead_letters().await
    }

    /// Put a dead-lettered mutation back in play with a fresh retry
    /// budget, and kick a drain if we are online.
    pub async fn retry_dead_letter(&self, id: &str) -> Result<PendingMutation> {
        let revived = self.queue.retry_dead_lettered(id).await?;
        if self.monitor.is_online() {
            let orchestrator = Arc::clone(&self.orchestrator);
            tokio::spawn(async move {
                let _ = orchestrator.sync_now().await;
            });
        }
        Ok(revived)
    }

    /// Drop a dead-lettered mutation for good.
    pub async fn discard_dead_letter(&self, id: &str) -> Result<()> {
        self.queue.discard_dead_lettered(id).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────────────────────

    /// Point-in-time status snapshot.
    pub async fn status(&self) -> PortalStatus {
        PortalStatus {
            online: self.monitor.is_online(),
            syncing: *self.orchestrator.watch_state().borrow() == SyncState::Syncing,
            pending_mutations: self.queue.pending_count().await,
            dead_lettered: self.queue.dead_letters().await.len(),
            last_report: self.orchestrator.last_report(),
        }
    }

    /// Debounced connectivity.
    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    /// Server id for a temp id, once the insert carrying it has landed.
    pub async fn resolve_temp_id(&self, temp_id: &str) -> Option<String> {
        self.temp_ids.resolve(temp_id).await
    }

    /// Subscribe to per-mutation lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<QueueEvent> {
        self.orchestrator.subscribe_events()
    }

    /// Subscribe to cache keys refreshed by background revalidation.
    pub fn subscribe_refreshed_keys(&self) -> broadcast::Receiver<String> {
        self.cache.subscribe_refreshed()
    }

    /// Watch the queued-mutation count.
    pub fn watch_pending(&self) -> watch::Receiver<usize> {
        self.queue.watch_pending()
    }

    /// Watch debounced connectivity transitions.
    pub fn watch_online(&self) -> watch::Receiver<bool> {
        self.monitor.subscribe()
    }

    /// Watch drain starts and finishes.
    pub fn watch_sync_state(&self) -> watch::Receiver<SyncState> {
        self.orchestrator.watch_state()
    }
}

impl<S: KvStore, R: RemoteStore> Drop for Portal<S, R> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Cache key for a resource read: the resource qualified by its query so
/// differently-filtered result sets never share an entry.
fn read_key(resource: &str, query: Option<&Value>) -> String {
    match query {
        Some(query) => fieldsync_core::cache_key(resource, &query.to_string()),
        None => fieldsync_core::cache_key(resource, "all"),
    }
}

/// Record temp id resolutions as inserts land.
fn spawn_temp_id_resolver(
    mut events: broadcast::Receiver<QueueEvent>,
    temp_ids: Arc<TempIdMap>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(QueueEvent::Applied {
                    temp_id: Some(temp_id),
                    record,
                    ..
                }) => {
                    if let Some(server_id) = server_id(&record) {
                        tracing::debug!(temp_id, server_id, "temp id resolved");
                        temp_ids.record(temp_id, server_id).await;
                    }
                }
                Ok(_) => {}
                // Missed events are fine: an unresolved temp id just
                // keeps rendering under its temp identity.
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn server_id(record: &Value) -> Option<String> {
    match record.get("id") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fieldsync_core::RemoteError;
    use fieldsync_store::MemoryKv;
    use serde_json::json;

    type RemoteResult = std::result::Result<Value, RemoteError>;

    struct NullRemote;

    #[async_trait]
    impl RemoteStore for NullRemote {
        async fn apply(&self, _mutation: &PendingMutation) -> RemoteResult {
            Ok(json!({"id": "srv-1"}))
        }

        async fn fetch(&self, _resource: &str, _query: Option<Value>) -> RemoteResult {
            Ok(json!([]))
        }
    }

    async fn offline_portal() -> Portal<MemoryKv, NullRemote> {
        Portal::new(MemoryKv::new(), NullRemote, PortalConfig::default()).await
    }

    #[tokio::test]
    async fn insert_assigns_a_temp_id_when_missing() {
        let portal = offline_portal().await;
        let m = portal
            .insert("work_orders", json!({"title": "fix pump"}))
            .await
            .unwrap();
        assert!(m.temp_id().unwrap().starts_with("tmp-"));

        let explicit = portal
            .insert("work_orders", json!({"tempId": "tmp-mine", "title": "x"}))
            .await
            .unwrap();
        assert_eq!(explicit.temp_id(), Some("tmp-mine"));
    }

    #[tokio::test]
    async fn status_reflects_the_queue_while_offline() {
        let portal = offline_portal().await;
        portal
            .insert("work_orders", json!({"title": "a"}))
            .await
            .unwrap();
        portal
            .update("work_orders", json!({"id": "wo-1", "done": true}))
            .await
            .unwrap();

        let status = portal.status().await;
        assert!(!status.online);
        assert!(!status.syncing);
        assert_eq!(status.pending_mutations, 2);
        assert_eq!(status.dead_lettered, 0);
        assert!(status.last_report.is_none());
    }

    #[tokio::test]
    async fn bound_view_overlays_queued_work_offline() {
        let portal = offline_portal().await;
        portal
            .insert("work_orders", json!({"title": "fix pump"}))
            .await
            .unwrap();

        let view = portal.bind("work_orders", None).await;
        assert!(!view.loading);
        assert_eq!(view.records.len(), 1);
        assert_eq!(view.records[0].data["title"], "fix pump");

        // Other resources see nothing.
        let other = portal.bind("tasks", None).await;
        assert!(other.records.is_empty());
    }
}
