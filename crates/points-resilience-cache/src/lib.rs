//! Ephemeral query cache with tag-based group invalidation.
//!
//! Results of expensive reads are stored under a key with a TTL and any number
//! of tags. Invalidating a tag removes every entry carrying it, which is how
//! writers drop all cached views of a customer or business at once.
//!
//! # Example
//!
//! ```rust
//! use points_resilience_cache::{CacheConfig, QueryCache, SetOptions};
//! use std::time::Duration;
//!
//! let cache: QueryCache<String, u64> = QueryCache::new(
//!     CacheConfig::builder()
//!         .name("balances")
//!         .default_ttl(Duration::from_secs(60))
//!         .build(),
//! );
//!
//! cache.set(
//!     "balance:42".to_string(),
//!     1_250,
//!     SetOptions::new().tag("customer:42").tag("business:7"),
//! );
//! assert_eq!(cache.get(&"balance:42".to_string()), Some(1_250));
//!
//! // A write for customer 42 drops every view tagged with it.
//! cache.invalidate_by_tag("customer:42");
//! assert_eq!(cache.get(&"balance:42".to_string()), None);
//! ```
//!
//! # Feature Flags
//!
//! - `metrics`: `cache_requests_total{result}` counter and `cache_size` gauge
//! - `tracing`: debug logs for lookups and invalidations

mod cache;
mod config;
mod events;
mod store;

pub use cache::{QueryCache, SetOptions};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use events::CacheEvent;
pub use store::CacheStats;
