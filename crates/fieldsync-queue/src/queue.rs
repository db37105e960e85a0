//! The durable mutation queue.

use std::sync::Arc;

use tokio::sync::{watch, Mutex, MutexGuard};

use fieldsync_core::{Clock, MutationKind, PendingMutation};
use fieldsync_store::KvStore;

use crate::error::{QueueError, Result};

/// Well-known storage key holding the queue as one JSON array.
pub const QUEUE_KEY: &str = "queue:mutations";

/// What happened to a mutation after a retriable failure was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Still queued; `retry_count` after the increment.
    Requeued { retry_count: u32 },
    /// Retry budget exhausted; flagged and retained.
    DeadLettered,
}

/// Durable FIFO of pending mutations.
///
/// The queue is mutated only by `enqueue` (any caller) and by the sync
/// orchestrator's drain loop; every change is persisted whole before the
/// call returns.
pub struct MutationQueue<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Vec<PendingMutation>>,
    pending_tx: watch::Sender<usize>,
}

impl<S: KvStore> MutationQueue<S> {
    /// Load the queue from storage.
    ///
    /// A missing or unreadable record yields an empty queue; an
    /// unreadable record is logged loudly since it means pending work was
    /// lost to storage corruption, not to this layer.
    pub async fn load(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        let mutations: Vec<PendingMutation> = match store.get(QUEUE_KEY).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(mutations) => mutations,
                Err(e) => {
                    tracing::error!(error = %e, "persisted mutation queue is corrupt, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read persisted queue, starting empty");
                Vec::new()
            }
        };

        let (pending_tx, _) = watch::channel(mutations.len());
        Self {
            store,
            clock,
            inner: Mutex::new(mutations),
            pending_tx,
        }
    }

    /// Append a new mutation and persist the queue.
    ///
    /// Never blocks on the network; the caller gets the mutation back
    /// immediately and the drain applies it later.
    pub async fn enqueue(
        &self,
        kind: MutationKind,
        resource: impl Into<String>,
        payload: serde_json::Value,
        max_retries: u32,
    ) -> Result<PendingMutation> {
        let mutation = PendingMutation::new(
            kind,
            resource,
            payload,
            max_retries,
            self.clock.now_millis(),
        );

        let mut inner = self.inner.lock().await;
        inner.push(mutation.clone());
        self.persist(&inner).await?;
        Ok(mutation)
    }

    /// The mutation at the head of the queue, dead-lettered or not.
    pub async fn peek(&self) -> Option<PendingMutation> {
        self.inner.lock().await.first().cloned()
    }

    /// The first mutation that is not dead-lettered.
    pub async fn peek_active(&self) -> Option<PendingMutation> {
        self.inner
            .lock()
            .await
            .iter()
            .find(|m| !m.dead_lettered)
            .cloned()
    }

    /// Remove a mutation after confirmed remote application.
    ///
    /// Returns whether anything was removed.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let before = inner.len();
        inner.retain(|m| m.id != id);
        if inner.len() == before {
            return Ok(false);
        }
        self.persist(&inner).await?;
        Ok(true)
    }

    /// Record a retriable failure: increment the retry count, or
    /// dead-letter once the budget is exhausted.
    pub async fn record_retriable_failure(&self, id: &str, error: &str) -> Result<FailureOutcome> {
        let mut inner = self.inner.lock().await;
        let mutation = inner
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        mutation.last_error = Some(error.to_string());
        let outcome = if mutation.retries_exhausted() {
            mutation.dead_lettered = true;
            FailureOutcome::DeadLettered
        } else {
            mutation.retry_count += 1;
            FailureOutcome::Requeued {
                retry_count: mutation.retry_count,
            }
        };

        self.persist(&inner).await?;
        Ok(outcome)
    }

    /// Dead-letter a mutation on a terminal failure, keeping it in the
    /// queue for explicit user action.
    pub async fn dead_letter(&self, id: &str, error: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let mutation = inner
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        mutation.dead_lettered = true;
        mutation.last_error = Some(error.to_string());
        self.persist(&inner).await?;
        Ok(())
    }

    /// Re-queue a dead-lettered mutation with a fresh retry budget.
    pub async fn retry_dead_lettered(&self, id: &str) -> Result<PendingMutation> {
        let mut inner = self.inner.lock().await;
        let mutation = inner
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        if !mutation.dead_lettered {
            return Err(QueueError::NotDeadLettered(id.to_string()));
        }

        mutation.dead_lettered = false;
        mutation.retry_count = 0;
        mutation.last_error = None;
        let revived = mutation.clone();
        self.persist(&inner).await?;
        Ok(revived)
    }

    /// Drop a dead-lettered mutation for good. This is the only path by
    /// which a mutation leaves the queue unapplied, and it requires the
    /// mutation to already be dead-lettered.
    pub async fn discard_dead_lettered(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let mutation = inner
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        if !mutation.dead_lettered {
            return Err(QueueError::NotDeadLettered(id.to_string()));
        }

        inner.retain(|m| m.id != id);
        self.persist(&inner).await?;
        Ok(())
    }

    /// Number of mutations in the queue, dead-lettered included: each one
    /// is still user-authored work awaiting an outcome.
    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Snapshot of the whole queue in FIFO order.
    pub async fn mutations(&self) -> Vec<PendingMutation> {
        self.inner.lock().await.clone()
    }

    /// Snapshot of dead-lettered mutations only.
    pub async fn dead_letters(&self) -> Vec<PendingMutation> {
        self.inner
            .lock()
            .await
            .iter()
            .filter(|m| m.dead_lettered)
            .cloned()
            .collect()
    }

    /// Watch the pending count; recomputed after every change.
    pub fn watch_pending(&self) -> watch::Receiver<usize> {
        self.pending_tx.subscribe()
    }

    /// Persist the queue as one JSON array and publish the new count.
    async fn persist(&self, inner: &MutexGuard<'_, Vec<PendingMutation>>) -> Result<()> {
        let bytes = serde_json::to_vec(&**inner)?;
        self.store.set(QUEUE_KEY, bytes).await?;
        let _ = self.pending_tx.send(inner.len());
        Ok(())
    }
}
