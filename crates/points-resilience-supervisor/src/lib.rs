//! Connection supervision for the backing data store.
//!
//! A [`ConnectionSupervisor`] owns the single logical client handle. It
//!
//! - connects and issues one liveness ping on [`initialize`](ConnectionSupervisor::initialize),
//! - pings the store periodically while connected,
//! - reconnects with capped exponential backoff plus jitter when a ping fails,
//!   with at most one reconnection in flight,
//! - wraps arbitrary operations in a retry policy
//!   ([`execute_with_retry`](ConnectionSupervisor::execute_with_retry)).
//!
//! State transitions are published through the event listener system and a
//! `tokio::sync::watch` channel.
//!
//! # Example
//!
//! ```rust
//! use points_resilience_supervisor::{
//!     ConnectionDescriptor, ConnectionSupervisor, StoreClient, StoreConnector, StoreError,
//!     SupervisorConfig,
//! };
//! use std::future::Future;
//! use std::time::Duration;
//!
//! struct Client;
//!
//! impl StoreClient for Client {
//!     fn ping(&self) -> impl Future<Output = Result<usize, StoreError>> + Send {
//!         async { Ok(1) }
//!     }
//! }
//!
//! struct Connector;
//!
//! impl StoreConnector for Connector {
//!     type Client = Client;
//!
//!     fn connect(
//!         &self,
//!         _descriptor: &ConnectionDescriptor,
//!     ) -> impl Future<Output = Result<Client, StoreError>> + Send {
//!         async { Ok(Client) }
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = SupervisorConfig::builder()
//!     .name("points-db")
//!     .descriptor(ConnectionDescriptor::new("postgres://localhost/points"))
//!     .health_check_interval(Duration::from_secs(30))
//!     .on_state_change(|from, to| println!("{from} -> {to}"))
//!     .build();
//!
//! let supervisor = ConnectionSupervisor::new(Connector, config);
//! supervisor.initialize().await.unwrap();
//!
//! let rows = supervisor
//!     .execute_with_retry(|client| async move { client.ping().await }, 3)
//!     .await
//!     .unwrap();
//! assert_eq!(rows, 1);
//! supervisor.shutdown();
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `metrics`: state transition and reconnection counters, connected gauge
//! - `tracing`: logs transitions, failed pings and retries

mod client;
mod config;
mod error;
mod events;
mod state;
mod supervisor;

pub use client::{ConnectionDescriptor, StoreClient, StoreConnector, StoreError};
pub use config::{SupervisorConfig, SupervisorConfigBuilder};
pub use error::SupervisorError;
pub use events::SupervisorEvent;
pub use state::ConnectionState;
pub use supervisor::ConnectionSupervisor;

pub use points_resilience_core::{ExponentialBackoff, FixedInterval, IntervalFunction, Jittered};
