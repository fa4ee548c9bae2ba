//! Redundant fanout of completion events.
//!
//! When a critical operation completes, dashboards and other observers need
//! to hear about it even if some of them are still starting up or one
//! delivery path is broken. [`DashboardSync`] delivers each [`SyncEvent`]
//! through several independent channels, and [`SyncBus`] gives subscribers
//! an at-least-once contract by retaining the last event of every topic.
//!
//! # Example
//!
//! ```rust
//! use points_resilience_fanout::{DashboardSync, FanoutConfig, SyncBus, SyncEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let sync = DashboardSync::new(
//!     FanoutConfig::builder().name("dashboards").build(),
//!     SyncBus::new(),
//! );
//!
//! let event = SyncEvent::new("customer-42", "points_credited")
//!     .identifier("transaction_ref", "0d9c")
//!     .identifier("new_balance", 1_250);
//! sync.notify(event.clone()).await;
//!
//! // A subscriber joining afterwards still sees the event.
//! let mut subscription = sync.subscribe();
//! assert_eq!(subscription.recv_unique().await.unwrap(), event);
//! sync.shutdown();
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `metrics`: `fanout_deliveries_total{channel,result}` counter
//! - `tracing`: logs channel failures and lagging subscribers

mod bus;
mod config;
mod error;
mod event;
mod events;
mod sync;

pub use bus::{Subscription, SyncBus};
pub use config::{FanoutConfig, FanoutConfigBuilder};
pub use error::FanoutError;
pub use event::{LastUpdate, SyncEvent};
pub use events::FanoutEvent;
pub use sync::{CallbackId, DashboardSync, DeliveryReport, SyncCallback};
