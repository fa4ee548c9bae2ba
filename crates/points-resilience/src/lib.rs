//! Resilience layer for a loyalty-points platform.
//!
//! `points-resilience` keeps point credits flowing while the backing data
//! store, the network or both are unreliable. Each component lives in its
//! own crate and is enabled here by feature:
//!
//! - **Supervisor** (`supervisor` feature): one supervised connection to the
//!   data store with liveness checks, reconnection with backoff and retried
//!   operations
//! - **Cache** (`cache` feature): TTL query cache with tag-based group
//!   invalidation
//! - **Executor** (`executor` feature): credits applied through an ordered
//!   chain of strategies, ending in a durable offline queue
//! - **Fanout** (`fanout` feature): completion events delivered through
//!   several redundant channels
//!
//! With `full`, [`ResilienceStack`] wires them together from one
//! [`Settings`] document.
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! points-resilience = { version = "0.1", features = ["full", "tracing"] }
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "full")]
//! # {
//! use points_resilience::core::MemoryStore;
//! use points_resilience::executor::{CreditRequest, InMemoryLedger};
//! use points_resilience::{ResilienceStack, Settings};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let settings = Settings::from_file("points-resilience.json").unwrap();
//! let ledger = InMemoryLedger::new();
//! let stack: ResilienceStack<_, i64> =
//!     ResilienceStack::new(ledger, &settings, Arc::new(MemoryStore::new()));
//! stack.start().await.unwrap();
//!
//! let result = stack.credit(CreditRequest::new("customer-1", "cafe-9", 10)).await.unwrap();
//! if result.offline {
//!     // Accepted, applied later by the background sync.
//! }
//! stack.shutdown();
//! # }
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `metrics` and `tracing` are forwarded to every enabled component.

// Re-export core (always available)
pub use points_resilience_core as core;

// Re-export components based on features
#[cfg(feature = "cache")]
pub use points_resilience_cache as cache;

#[cfg(feature = "executor")]
pub use points_resilience_executor as executor;

#[cfg(feature = "fanout")]
pub use points_resilience_fanout as fanout;

#[cfg(feature = "supervisor")]
pub use points_resilience_supervisor as supervisor;

pub mod settings;
pub use settings::{Settings, SettingsError};

#[cfg(all(feature = "cache", feature = "executor"))]
mod stack;
#[cfg(all(feature = "cache", feature = "executor"))]
pub use stack::{customer_tag, ResilienceStack};
