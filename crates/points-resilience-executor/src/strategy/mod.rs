//! Execution strategies tried in order by the executor.
//!
//! Every strategy receives the same [`CreditOperation`], so each attempt
//! carries the same transaction reference. The executor stops at the first
//! strategy returning `Ok`.

mod direct;
mod network;
mod offline;
mod simulation;

pub use direct::DirectWriteStrategy;
pub use network::{HttpEndpointStrategy, NetworkEndpoint};
pub use offline::OfflineQueueStrategy;
pub use simulation::ClientSimulationStrategy;

use crate::error::StrategyError;
use crate::request::CreditOperation;
use crate::result::Applied;
use futures::future::BoxFuture;

/// One way of applying a credit.
pub trait CreditStrategy: Send + Sync {
    /// Name recorded in diagnostics and metrics.
    fn name(&self) -> &str;

    /// Attempts to apply `operation`.
    fn attempt<'a>(
        &'a self,
        operation: &'a CreditOperation,
    ) -> BoxFuture<'a, Result<Applied, StrategyError>>;

    /// Whether the background sync may replay queued operations through this
    /// strategy. Strategies that only record the operation locally return
    /// false.
    fn replayable(&self) -> bool {
        true
    }
}
