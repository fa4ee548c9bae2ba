//! Error types for the guaranteed executor.

use crate::result::Attempt;
use points_resilience_core::{BoxError, StorageError};
use points_resilience_supervisor::SupervisorError;
use std::time::Duration;

/// Errors from a credential provider.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// A new credential could not be minted.
    #[error("failed to mint credential: {0}")]
    Mint(String),

    /// No identity is available to mint from.
    #[error("no identity available")]
    NoIdentity,
}

/// Errors from the offline queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The backing store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Why a single strategy attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    /// The direct write through the connection supervisor failed.
    #[error("direct write failed: {0}")]
    Store(#[from] SupervisorError),

    /// No credential could be obtained for a network endpoint.
    #[error("credential unavailable: {0}")]
    Credential(#[from] CredentialError),

    /// The endpoint answered with an unsuccessful status.
    #[error("endpoint {endpoint} responded with status {status}")]
    Rejected {
        /// Endpoint name.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// The endpoint did not answer within its timeout.
    #[error("endpoint {endpoint} timed out after {timeout:?}")]
    Timeout {
        /// Endpoint name.
        endpoint: String,
        /// The bound that elapsed.
        timeout: Duration,
    },

    /// The request could not be delivered.
    #[error("endpoint {endpoint} unreachable: {message}")]
    Transport {
        /// Endpoint name.
        endpoint: String,
        /// Transport error description.
        message: String,
    },

    /// The operation could not be recorded durably.
    #[error("offline queue unavailable: {0}")]
    Queue(#[from] QueueError),

    /// Any other failure from a custom strategy.
    #[error(transparent)]
    Other(BoxError),
}

/// Every strategy failed, including the offline queue.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// No strategy applied or queued the operation.
    #[error("all {} strategies failed", .diagnostics.len())]
    Exhausted {
        /// One entry per attempted strategy, in order.
        diagnostics: Vec<Attempt>,
    },
}

impl ExecutionError {
    /// The attempts made before giving up.
    pub fn diagnostics(&self) -> &[Attempt] {
        match self {
            ExecutionError::Exhausted { diagnostics } => diagnostics,
        }
    }
}
