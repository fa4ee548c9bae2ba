use super::CreditStrategy;
use crate::error::StrategyError;
use crate::queue::OfflineQueue;
use crate::request::CreditOperation;
use crate::result::Applied;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::Notify;

/// Last resort: persists the operation and wakes the background sync.
///
/// Success here means "accepted, not yet applied".
#[derive(Debug, Clone)]
pub struct OfflineQueueStrategy {
    queue: OfflineQueue,
    wake: Arc<Notify>,
}

impl OfflineQueueStrategy {
    /// Creates the strategy. `wake` is notified after every enqueue.
    pub fn new(queue: OfflineQueue, wake: Arc<Notify>) -> Self {
        Self { queue, wake }
    }
}

impl CreditStrategy for OfflineQueueStrategy {
    fn name(&self) -> &str {
        "offline"
    }

    fn attempt<'a>(
        &'a self,
        operation: &'a CreditOperation,
    ) -> BoxFuture<'a, Result<Applied, StrategyError>> {
        Box::pin(async move {
            let pending = self.queue.enqueue(operation, self.name()).await?;
            self.wake.notify_one();

            #[cfg(feature = "tracing")]
            tracing::warn!(
                id = %pending.id,
                transaction_ref = %operation.transaction_ref,
                "credit queued for offline sync"
            );

            Ok(Applied::queued(pending.id))
        })
    }

    fn replayable(&self) -> bool {
        false
    }
}
