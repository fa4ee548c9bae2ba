//! Durable queue of credits accepted while every synchronous path failed.

use crate::error::QueueError;
use crate::request::{CreditOperation, CreditRequest, TransactionRef};
use chrono::{DateTime, Utc};
#[cfg(feature = "metrics")]
use metrics::{describe_gauge, gauge};
use points_resilience_core::{KeyValueStore, KeyValueStoreExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use tokio::sync::Mutex;
use uuid::Uuid;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

const DEFAULT_KEY: &str = "offline-queue:credits";

/// Lifecycle of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// Waiting for the next sync sweep.
    Pending,
    /// Claimed by a sweep that has not finished.
    Syncing,
    /// Applied by the sink.
    Done,
    /// The last replay failed; retried by later sweeps.
    Failed,
}

/// A credit waiting to be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: String,
    /// Idempotency key shared with every earlier attempt.
    pub transaction_ref: TransactionRef,
    /// The original request, unmodified.
    pub payload: CreditRequest,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: OperationStatus,
    /// Failed replays so far.
    pub attempt_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Strategy that recorded the operation.
    pub recorded_by: String,
}

impl PendingOperation {
    fn new(operation: &CreditOperation, recorded_by: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            transaction_ref: operation.transaction_ref.clone(),
            payload: operation.request.clone(),
            created_at: now,
            updated_at: now,
            status: OperationStatus::Pending,
            attempt_count: 0,
            last_error: None,
            recorded_by: recorded_by.to_string(),
        }
    }

    /// Rebuilds the operation with its original reference for replay.
    pub fn operation(&self) -> CreditOperation {
        CreditOperation {
            request: self.payload.clone(),
            transaction_ref: self.transaction_ref.clone(),
        }
    }

    fn is_ready(&self) -> bool {
        matches!(
            self.status,
            OperationStatus::Pending | OperationStatus::Failed
        )
    }
}

/// A queue of [`PendingOperation`]s persisted as one JSON array in a
/// [`KeyValueStore`].
///
/// Every mutation is a read-modify-write of the whole array under an async
/// lock, so clones of one queue never lose each other's updates. Separate
/// queues over the same key are not coordinated.
#[derive(Clone)]
pub struct OfflineQueue {
    store: Arc<dyn KeyValueStore>,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl OfflineQueue {
    /// Creates a queue stored under `"offline-queue:credits"`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, DEFAULT_KEY)
    }

    /// Creates a queue stored under `key`.
    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_gauge!(
                "offline_queue_depth",
                "Number of credits waiting in the offline queue"
            );
        });

        Self {
            store,
            key: key.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Storage key of the queue.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Records `operation`. When its reference is already queued and not
    /// done, the existing entry is returned and nothing is written.
    pub async fn enqueue(
        &self,
        operation: &CreditOperation,
        recorded_by: &str,
    ) -> Result<PendingOperation, QueueError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;

        if let Some(existing) = entries.iter().find(|entry| {
            entry.transaction_ref == operation.transaction_ref
                && entry.status != OperationStatus::Done
        }) {
            return Ok(existing.clone());
        }

        let pending = PendingOperation::new(operation, recorded_by);
        entries.push(pending.clone());
        self.save(&entries).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            queue = %self.key,
            id = %pending.id,
            transaction_ref = %pending.transaction_ref,
            "operation queued"
        );

        Ok(pending)
    }

    /// Every queued operation, oldest first.
    pub async fn list(&self) -> Result<Vec<PendingOperation>, QueueError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// The operation with `id`.
    pub async fn get(&self, id: &str) -> Result<Option<PendingOperation>, QueueError> {
        Ok(self.list().await?.into_iter().find(|entry| entry.id == id))
    }

    /// Operations not yet done.
    pub async fn pending_count(&self) -> Result<usize, QueueError> {
        Ok(self
            .list()
            .await?
            .iter()
            .filter(|entry| entry.status != OperationStatus::Done)
            .count())
    }

    /// Replaces the stored entry with the same id. Returns false if there is
    /// none.
    pub async fn update(&self, operation: &PendingOperation) -> Result<bool, QueueError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let Some(slot) = entries.iter_mut().find(|entry| entry.id == operation.id) else {
            return Ok(false);
        };
        *slot = operation.clone();
        slot.updated_at = Utc::now();
        self.save(&entries).await?;
        Ok(true)
    }

    /// Deletes the entry with `id`. Returns false if there is none.
    pub async fn remove(&self, id: &str) -> Result<bool, QueueError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(&entries).await?;
        Ok(true)
    }

    /// Returns operations left `Syncing` by an interrupted sweep to
    /// `Pending`. Call once at startup, before the first sweep.
    pub async fn recover(&self) -> Result<usize, QueueError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let now = Utc::now();
        let mut recovered = 0;
        for entry in entries
            .iter_mut()
            .filter(|entry| entry.status == OperationStatus::Syncing)
        {
            entry.status = OperationStatus::Pending;
            entry.updated_at = now;
            recovered += 1;
        }
        if recovered > 0 {
            self.save(&entries).await?;

            #[cfg(feature = "tracing")]
            tracing::info!(queue = %self.key, recovered, "recovered interrupted operations");
        }
        Ok(recovered)
    }

    /// Marks every `Pending` or `Failed` operation accepted by `is_due` as
    /// `Syncing` and returns them.
    pub async fn claim_ready<F>(&self, mut is_due: F) -> Result<Vec<PendingOperation>, QueueError>
    where
        F: FnMut(&PendingOperation) -> bool,
    {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let now = Utc::now();
        let mut claimed = Vec::new();
        for entry in entries
            .iter_mut()
            .filter(|entry| entry.is_ready() && is_due(entry))
        {
            entry.status = OperationStatus::Syncing;
            entry.updated_at = now;
            claimed.push(entry.clone());
        }
        if !claimed.is_empty() {
            self.save(&entries).await?;
        }
        Ok(claimed)
    }

    async fn load(&self) -> Result<Vec<PendingOperation>, QueueError> {
        Ok(self
            .store
            .get_json::<Vec<PendingOperation>>(&self.key)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, entries: &[PendingOperation]) -> Result<(), QueueError> {
        self.store.set_json(&self.key, entries).await?;

        #[cfg(feature = "metrics")]
        gauge!("offline_queue_depth", "queue" => self.key.clone()).set(
            entries
                .iter()
                .filter(|entry| entry.status != OperationStatus::Done)
                .count() as f64,
        );

        Ok(())
    }
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("key", &self.key)
            .finish()
    }
}
