//! Test organization:
//! - ttl.rs: expiry, freshness and pruning on the paused clock
//! - tags.rs: group invalidation and re-tagging
//! - sharing.rs: clones, concurrent writers and read-through loading

mod sharing;
mod ttl;

use points_resilience_cache::{CacheConfig, QueryCache};

pub(crate) fn cache<V: Clone>() -> QueryCache<String, V> {
    QueryCache::new(CacheConfig::builder().name("it-cache").build())
}

pub(crate) fn key(k: &str) -> String {
    k.to_string()
}
