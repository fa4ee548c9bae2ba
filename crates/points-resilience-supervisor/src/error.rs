//! Errors surfaced by the connection supervisor.

use crate::client::StoreError;

/// Errors returned to callers of the [`ConnectionSupervisor`](crate::ConnectionSupervisor).
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// `initialize` could not establish a healthy connection. Reconnection has
    /// been scheduled in the background.
    #[error("initial connection failed: {0}")]
    ConnectFailed(#[source] StoreError),

    /// A retried operation failed on every attempt.
    #[error("operation failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Attempts made, including the first.
        attempts: usize,
        /// Error from the final attempt.
        #[source]
        source: StoreError,
    },

    /// The supervisor was shut down.
    #[error("connection supervisor is shut down")]
    ShutDown,
}

impl SupervisorError {
    /// Returns the last store error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            SupervisorError::ConnectFailed(e) => Some(e),
            SupervisorError::RetriesExhausted { source, .. } => Some(source),
            SupervisorError::ShutDown => None,
        }
    }

    /// Unwraps into the last store error, mapping `ShutDown` to `NotConnected`.
    pub fn into_store_error(self) -> StoreError {
        match self {
            SupervisorError::ConnectFailed(e) => e,
            SupervisorError::RetriesExhausted { source, .. } => source,
            SupervisorError::ShutDown => StoreError::NotConnected,
        }
    }
}
