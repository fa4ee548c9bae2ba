use points_resilience_core::StorageError;

/// Errors raised by the fanout.
#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    /// The last-update record could not be read or written.
    #[error("last-update record unavailable: {0}")]
    Storage(#[from] StorageError),

    /// The bus was dropped while a subscriber was waiting.
    #[error("sync bus closed")]
    Closed,
}
