use super::CreditStrategy;
use crate::error::StrategyError;
use crate::queue::OfflineQueue;
use crate::request::CreditOperation;
use crate::result::Applied;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::Notify;

/// Answers locally with a provisional result and records the operation for
/// reconciliation by the background sync. Contacts no remote system.
#[derive(Debug, Clone)]
pub struct ClientSimulationStrategy {
    queue: OfflineQueue,
    wake: Arc<Notify>,
}

impl ClientSimulationStrategy {
    pub fn new(queue: OfflineQueue, wake: Arc<Notify>) -> Self {
        Self { queue, wake }
    }
}

impl CreditStrategy for ClientSimulationStrategy {
    fn name(&self) -> &str {
        "client_simulation"
    }

    fn attempt<'a>(
        &'a self,
        operation: &'a CreditOperation,
    ) -> BoxFuture<'a, Result<Applied, StrategyError>> {
        Box::pin(async move {
            let pending = self.queue.enqueue(operation, self.name()).await?;
            self.wake.notify_one();
            Ok(Applied {
                provisional: true,
                pending_operation_id: Some(pending.id),
                ..Applied::default()
            })
        })
    }

    fn replayable(&self) -> bool {
        false
    }
}
