//! Core infrastructure for points-resilience.
//!
//! This crate provides the pieces shared by every resilience component:
//! - Event system for observability ([`events`])
//! - Retry and reconnection interval functions with jitter ([`backoff`])
//! - Durable key-value storage used by the offline queue and the
//!   last-update record ([`storage`])

pub mod backoff;
pub mod events;
pub mod storage;

pub use backoff::{ExponentialBackoff, FixedInterval, FnInterval, IntervalFunction, Jittered};
pub use events::{ComponentEvent, EventListener, EventListeners, FnListener};
pub use storage::{FileStore, KeyValueStore, KeyValueStoreExt, MemoryStore, StorageError};

/// Boxed error type used where an error source is opaque.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
