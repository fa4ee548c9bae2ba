//! Background replay of queued credits.

use crate::error::QueueError;
use crate::events::ExecutorEvent;
use crate::executor::ExecutorInner;
use crate::queue::{OperationStatus, PendingOperation};
#[cfg(feature = "metrics")]
use metrics::counter;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Outcome of one [`OfflineSync::sweep_once`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Operations applied and removed from the queue.
    pub applied: usize,
    /// Operations whose replay failed this sweep.
    pub failed: usize,
    /// Operations left for a later sweep because their replay backoff has
    /// not elapsed.
    pub deferred: usize,
    /// Queued operations that have failed at least `max_sync_attempts`
    /// replays. They stay queued and are retried every maximum replay delay.
    pub stalled: usize,
}

/// Replays queued credits through the executor's replayable strategies.
///
/// Replays reuse each operation's original transaction reference, so a
/// credit that was in fact applied before it was queued is not applied
/// twice by a sink that de-duplicates.
///
/// A failed replay is not tried again until its backoff elapses (see
/// [`ExecutorConfig::replay_delay`](crate::ExecutorConfig::replay_delay)),
/// however many sweeps run in between. Nothing is ever dropped: an
/// operation that keeps failing is reported as stalled and retried at the
/// maximum replay delay. The schedule lives in memory and is shared by every
/// `OfflineSync` of one executor; after a restart every queued operation is
/// due at once.
#[derive(Clone)]
pub struct OfflineSync {
    inner: Arc<ExecutorInner>,
}

impl OfflineSync {
    pub(crate) fn new(inner: Arc<ExecutorInner>) -> Self {
        Self { inner }
    }

    /// Resets operations left `Syncing` by an interrupted process.
    pub async fn recover(&self) -> Result<usize, QueueError> {
        self.inner.queue.recover().await
    }

    /// Claims every operation that is due and replays it once.
    pub async fn sweep_once(&self) -> Result<SweepReport, QueueError> {
        let inner = &self.inner;
        let now = Instant::now();
        let not_due: HashSet<String> = self
            .schedule()
            .iter()
            .filter(|(_, due)| **due > now)
            .map(|(id, _)| id.clone())
            .collect();

        let claimed = inner
            .queue
            .claim_ready(|entry| !not_due.contains(&entry.id))
            .await?;
        let mut report = SweepReport::default();

        for pending in claimed {
            if self.replay(pending).await? {
                report.applied += 1;
            } else {
                report.failed += 1;
            }
        }

        let remaining = inner.queue.list().await?;
        let max_attempts = inner.config.max_sync_attempts;
        for entry in &remaining {
            let waiting = matches!(
                entry.status,
                OperationStatus::Pending | OperationStatus::Failed
            );
            if waiting && not_due.contains(&entry.id) {
                report.deferred += 1;
            }
            if entry.status == OperationStatus::Failed && entry.attempt_count >= max_attempts {
                report.stalled += 1;
            }
        }

        let queued: HashSet<&str> = remaining.iter().map(|entry| entry.id.as_str()).collect();
        self.schedule()
            .retain(|id, _| queued.contains(id.as_str()));

        #[cfg(feature = "tracing")]
        {
            if report.applied > 0 || report.failed > 0 {
                tracing::info!(
                    executor = %inner.config.name,
                    applied = report.applied,
                    failed = report.failed,
                    deferred = report.deferred,
                    stalled = report.stalled,
                    "offline sync sweep finished"
                );
            }
        }

        Ok(report)
    }

    fn schedule(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.inner
            .replay_schedule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns whether the operation was applied.
    async fn replay(&self, mut pending: PendingOperation) -> Result<bool, QueueError> {
        let inner = &self.inner;
        let operation = pending.operation();
        let mut last_error = String::from("no replayable strategy configured");

        for strategy in inner.strategies.iter().filter(|s| s.replayable()) {
            let start = Instant::now();
            match strategy.attempt(&operation).await {
                Ok(applied) => {
                    inner.record_success(strategy.name(), start.elapsed());
                    inner.queue.remove(&pending.id).await?;
                    self.schedule().remove(&pending.id);

                    inner.config.event_listeners.emit(&ExecutorEvent::Replayed {
                        name: inner.config.name.clone(),
                        timestamp: Instant::now(),
                        pending_operation_id: pending.id.clone(),
                        strategy: strategy.name().to_string(),
                    });

                    #[cfg(feature = "metrics")]
                    counter!(
                        "offline_sync_total",
                        "executor" => inner.config.name.clone(),
                        "result" => "applied"
                    )
                    .increment(1);

                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        executor = %inner.config.name,
                        id = %pending.id,
                        transaction_ref = %operation.transaction_ref,
                        strategy = strategy.name(),
                        "queued credit applied"
                    );

                    inner.announce(&operation, strategy.name(), &applied).await;
                    return Ok(true);
                }
                Err(error) => {
                    last_error = error.to_string();
                    inner.record_failure(strategy.name(), &last_error, start.elapsed());
                }
            }
        }

        pending.status = OperationStatus::Failed;
        pending.attempt_count = pending.attempt_count.saturating_add(1);
        pending.last_error = Some(last_error.clone());
        inner.queue.update(&pending).await?;

        let retry_in = inner.config.replay_delay(pending.attempt_count);
        let stalled = pending.attempt_count >= inner.config.max_sync_attempts;
        self.schedule()
            .insert(pending.id.clone(), Instant::now() + retry_in);

        inner.config.event_listeners.emit(&ExecutorEvent::ReplayFailed {
            name: inner.config.name.clone(),
            timestamp: Instant::now(),
            pending_operation_id: pending.id.clone(),
            attempt_count: pending.attempt_count,
            error: last_error,
            retry_in,
            stalled,
        });

        #[cfg(feature = "metrics")]
        counter!(
            "offline_sync_total",
            "executor" => inner.config.name.clone(),
            "result" => if stalled { "stalled" } else { "failed" }
        )
        .increment(1);

        #[cfg(feature = "tracing")]
        {
            let error = pending.last_error.as_deref().unwrap_or_default();
            if stalled {
                tracing::error!(
                    executor = %inner.config.name,
                    id = %pending.id,
                    attempt_count = pending.attempt_count,
                    ?retry_in,
                    error,
                    "queued credit stalled"
                );
            } else {
                tracing::warn!(
                    executor = %inner.config.name,
                    id = %pending.id,
                    attempt_count = pending.attempt_count,
                    ?retry_in,
                    error,
                    "queued credit replay failed"
                );
            }
        }

        Ok(false)
    }

    /// Runs the sync in the background: recovery and one sweep right away,
    /// then a sweep every sync interval and whenever an operation is queued.
    ///
    /// Abort the returned handle to stop it.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let config = &self.inner.config;
        // interval_at panics on a zero period.
        let period = config.sync_interval.max(Duration::from_millis(1));
        let wake = Arc::clone(&self.inner.wake);

        if let Err(_error) = self.recover().await {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                executor = %self.inner.config.name,
                error = %_error,
                "offline queue recovery failed"
            );
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if let Err(_error) = self.sweep_once().await {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    executor = %self.inner.config.name,
                    error = %_error,
                    "offline sync sweep failed"
                );
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = wake.notified() => {}
            }
        }
    }
}

impl std::fmt::Debug for OfflineSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineSync")
            .field("executor", &self.inner.config.name)
            .field("queue", &self.inner.queue)
            .finish()
    }
}
