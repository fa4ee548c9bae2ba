use super::CreditStrategy;
use crate::error::StrategyError;
use crate::ledger::PointsLedger;
use crate::request::CreditOperation;
use crate::result::Applied;
use futures::future::BoxFuture;
use points_resilience_supervisor::{ConnectionSupervisor, StoreConnector};

const DEFAULT_RETRIES: usize = 2;

/// Writes the credit through the connection supervisor's client, with the
/// supervisor's retry policy.
pub struct DirectWriteStrategy<C: StoreConnector> {
    supervisor: ConnectionSupervisor<C>,
    retries: usize,
}

impl<C> DirectWriteStrategy<C>
where
    C: StoreConnector,
    C::Client: PointsLedger,
{
    /// Creates the strategy with 2 attempts per credit.
    pub fn new(supervisor: ConnectionSupervisor<C>) -> Self {
        Self {
            supervisor,
            retries: DEFAULT_RETRIES,
        }
    }

    /// Sets the number of attempts passed to
    /// [`execute_with_retry`](ConnectionSupervisor::execute_with_retry).
    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// The supervisor writes go through.
    pub fn supervisor(&self) -> &ConnectionSupervisor<C> {
        &self.supervisor
    }
}

impl<C> CreditStrategy for DirectWriteStrategy<C>
where
    C: StoreConnector,
    C::Client: PointsLedger,
{
    fn name(&self) -> &str {
        "direct"
    }

    fn attempt<'a>(
        &'a self,
        operation: &'a CreditOperation,
    ) -> BoxFuture<'a, Result<Applied, StrategyError>> {
        Box::pin(async move {
            let receipt = self
                .supervisor
                .execute_with_retry(
                    move |client| async move { client.credit(operation).await },
                    self.retries,
                )
                .await?;
            Ok(Applied::confirmed(
                receipt.transaction_id,
                Some(receipt.new_balance),
            ))
        })
    }
}

impl<C: StoreConnector> std::fmt::Debug for DirectWriteStrategy<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectWriteStrategy")
            .field("supervisor", &self.supervisor)
            .field("retries", &self.retries)
            .finish()
    }
}
