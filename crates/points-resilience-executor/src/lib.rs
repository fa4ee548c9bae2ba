//! Guaranteed execution of point credits.
//!
//! A credit must never be silently lost. [`GuaranteedExecutor`] tries an
//! ordered chain of [`CreditStrategy`]s and stops at the first success:
//!
//! 1. a direct write through a
//!    [`ConnectionSupervisor`](points_resilience_supervisor::ConnectionSupervisor)
//!    to a [`PointsLedger`],
//! 2. each alternate [`NetworkEndpoint`], authenticated through a
//!    [`CredentialProvider`],
//! 3. custom strategies,
//! 4. an optional client-side simulation recording a provisional result,
//! 5. the durable [`OfflineQueue`].
//!
//! Every attempt carries the same [`TransactionRef`], so sinks can ignore
//! repeats. [`OfflineSync`] replays queued credits later with their original
//! reference.
//!
//! # Example
//!
//! ```rust
//! use points_resilience_core::MemoryStore;
//! use points_resilience_executor::{
//!     CreditRequest, GuaranteedExecutor, InMemoryLedger, OfflineQueue,
//! };
//! use points_resilience_supervisor::{ConnectionSupervisor, SupervisorConfig};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let ledger = InMemoryLedger::new();
//! let supervisor = ConnectionSupervisor::new(ledger.clone(), SupervisorConfig::default());
//! supervisor.initialize().await.unwrap();
//!
//! let executor = GuaranteedExecutor::builder(OfflineQueue::new(Arc::new(MemoryStore::new())))
//!     .direct(supervisor.clone())
//!     .build();
//!
//! let result = executor
//!     .execute(CreditRequest::new("customer-1", "cafe-9", 25).reason("purchase"))
//!     .await
//!     .unwrap();
//!
//! assert!(result.is_applied());
//! assert_eq!(result.strategy_used, "direct");
//! assert_eq!(ledger.balance("customer-1", "cafe-9"), 25);
//! supervisor.shutdown();
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `metrics`: `credit_attempts_total{strategy,result}`,
//!   `offline_sync_total{result}` and the `offline_queue_depth` gauge
//! - `tracing`: logs failed strategies, queued credits and sync sweeps

mod config;
mod credentials;
mod error;
mod events;
mod executor;
mod ledger;
mod queue;
mod request;
mod result;
pub mod strategy;
mod sync;

pub use config::{ExecutorConfig, ExecutorConfigBuilder};
pub use credentials::{
    Credential, CredentialProvider, MintFn, MintingCredentials, StaticCredentials,
};
pub use error::{CredentialError, ExecutionError, QueueError, StrategyError};
pub use events::ExecutorEvent;
pub use executor::{ExecutorBuilder, GuaranteedExecutor};
pub use ledger::{InMemoryLedger, LedgerEntry, LedgerReceipt, PointsLedger};
pub use queue::{OfflineQueue, OperationStatus, PendingOperation};
pub use request::{CreditOperation, CreditRequest, TransactionRef};
pub use result::{Applied, Attempt, Identifiers, OperationResult};
pub use strategy::{CreditStrategy, NetworkEndpoint};
pub use sync::{OfflineSync, SweepReport};
