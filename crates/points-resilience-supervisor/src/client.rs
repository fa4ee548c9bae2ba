//! Contracts for the supervised data-store client.

use points_resilience_core::BoxError;
use std::future::Future;
use std::time::Duration;

/// Describes how to reach the backing data store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionDescriptor {
    /// Connection URL or DSN understood by the connector.
    pub url: String,

    /// Optional label used in logs (never the URL, which may hold secrets).
    pub label: Option<String>,
}

impl ConnectionDescriptor {
    /// Creates a descriptor for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: None,
        }
    }

    /// Sets the log label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label for logs, falling back to `"store"`.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or("store")
    }
}

/// Errors reported by a data-store client or connector.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// No client handle is currently installed.
    #[error("not connected")]
    NotConnected,

    /// The liveness query returned an unexpected row count.
    #[error("liveness ping returned {rows} rows, expected exactly 1")]
    PingRejected {
        /// Rows returned by the ping.
        rows: usize,
    },

    /// A connect or ping call exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A statement was rejected by the store.
    #[error("query failed: {0}")]
    Query(String),

    /// Any other client failure.
    #[error(transparent)]
    Other(BoxError),
}

impl StoreError {
    /// Returns true for failures that indicate the connection itself is gone,
    /// as opposed to a statement-level rejection.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            StoreError::Connection(_)
                | StoreError::NotConnected
                | StoreError::PingRejected { .. }
                | StoreError::Timeout(_)
        )
    }
}

/// A query-capable handle to the data store.
pub trait StoreClient: Send + Sync + 'static {
    /// Runs the liveness query and returns the number of rows it produced.
    ///
    /// A healthy connection returns exactly one row.
    fn ping(&self) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

/// Factory producing client handles from a [`ConnectionDescriptor`].
pub trait StoreConnector: Send + Sync + 'static {
    /// Client type produced by this connector.
    type Client: StoreClient;

    /// Opens a new client handle.
    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> impl Future<Output = Result<Self::Client, StoreError>> + Send;
}
