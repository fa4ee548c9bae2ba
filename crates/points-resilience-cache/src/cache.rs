use crate::config::CacheConfig;
use crate::events::CacheEvent;
use crate::store::{CacheStats, Lookup, TaggedStore};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::future::Future;
use std::hash::Hash;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Options for [`QueryCache::set`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Lifetime of the entry; the cache default when `None`.
    pub ttl: Option<Duration>,
    /// Tags the entry can be invalidated by.
    pub tags: Vec<String>,
}

impl SetOptions {
    /// Options with the default TTL and no tags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the entry lifetime.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Adds one tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Adds several tags.
    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// A keyed TTL cache with tag-based group invalidation.
///
/// Expiry is lazy: an entry past its deadline is deleted when it is next read
/// (or by [`prune`](Self::prune)) and never returned. Freshness is a separate,
/// weaker check: [`is_fresh`](Self::is_fresh) reports whether an entry is
/// younger than a caller-chosen threshold, so callers can serve stale data
/// while revalidating. The cache never refreshes on its own.
///
/// Clones share the same entries.
pub struct QueryCache<K, V> {
    config: Arc<CacheConfig>,
    store: Arc<Mutex<TaggedStore<K, V>>>,
}

impl<K, V> Clone for QueryCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
        }
    }
}

impl<K, V> QueryCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "cache_requests_total",
                "Total number of cache requests (hits and misses)"
            );
            describe_gauge!("cache_size", "Current number of entries in the cache");
        });

        Self {
            config: Arc::new(config),
            store: Arc::new(Mutex::new(TaggedStore::new())),
        }
    }

    /// Stores `data` under `key`.
    ///
    /// Replacing an existing key also replaces its tag set: the key is
    /// detached from tags it no longer carries.
    pub fn set(&self, key: K, data: V, options: SetOptions) {
        let ttl = options.ttl.unwrap_or(self.config.default_ttl);
        let mut store = self.lock();
        store.insert(key, data, ttl, &options.tags, Instant::now());
        self.record_size(store.len());
    }

    /// Returns the live value for `key`, deleting it if it has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut store = self.lock();
        let lookup = store.get(key, Instant::now());
        let size = store.len();
        drop(store);

        match lookup {
            Lookup::Hit(data) => {
                self.record_request("hit");
                self.emit(CacheEvent::Hit {
                    name: self.config.name.clone(),
                    timestamp: Instant::now(),
                });
                Some(data)
            }
            Lookup::Miss => {
                self.record_request("miss");
                self.emit(CacheEvent::Miss {
                    name: self.config.name.clone(),
                    timestamp: Instant::now(),
                });
                None
            }
            Lookup::Expired => {
                self.record_request("miss");
                self.record_size(size);
                self.emit(CacheEvent::Expired {
                    name: self.config.name.clone(),
                    timestamp: Instant::now(),
                });
                None
            }
        }
    }

    /// Returns true if a live entry exists for `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains(key, Instant::now())
    }

    /// Returns true if `key` is live and no older than `stale_threshold`.
    pub fn is_fresh(&self, key: &K, stale_threshold: Duration) -> bool {
        self.lock().is_fresh(key, stale_threshold, Instant::now())
    }

    /// Removes `key`. Returns whether an entry was removed.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut store = self.lock();
        let removed = store.remove(key);
        self.record_size(store.len());
        drop(store);

        if removed {
            self.emit(CacheEvent::Invalidated {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
            });
        }
        removed
    }

    /// Removes every entry tagged with `tag` and discards the tag.
    /// Returns the number of entries removed.
    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        let mut store = self.lock();
        let removed = store.remove_tag(tag);
        self.record_size(store.len());
        drop(store);

        #[cfg(feature = "tracing")]
        tracing::debug!(cache = %self.config.name, tag, removed, "invalidated tag");

        self.emit(CacheEvent::TagInvalidated {
            name: self.config.name.clone(),
            timestamp: Instant::now(),
            tag: tag.to_string(),
            removed,
        });
        removed
    }

    /// Deletes every expired entry. Returns how many were deleted.
    pub fn prune(&self) -> usize {
        let mut store = self.lock();
        let pruned = store.prune(Instant::now());
        self.record_size(store.len());

        #[cfg(feature = "tracing")]
        if pruned > 0 {
            tracing::debug!(cache = %self.config.name, pruned, "pruned expired entries");
        }
        pruned
    }

    /// Removes everything.
    pub fn clear(&self) {
        self.lock().clear();
        self.record_size(0);
    }

    /// Point-in-time statistics.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats(Instant::now())
    }

    /// Tags currently attached to `key`, sorted.
    pub fn tags(&self, key: &K) -> Vec<String> {
        self.lock().tags_of(key)
    }

    /// The cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the cached value for `key`, or runs `fetch` and caches its
    /// result. A failed fetch is returned as is and nothing is cached.
    ///
    /// Concurrent misses for the same key each run `fetch`.
    pub async fn get_or_insert_with<F, Fut, E>(
        &self,
        key: K,
        options: SetOptions,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(data) = self.get(&key) {
            return Ok(data);
        }

        let data = fetch().await?;
        self.set(key, data.clone(), options);
        Ok(data)
    }

    fn lock(&self) -> MutexGuard<'_, TaggedStore<K, V>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CacheEvent) {
        self.config.event_listeners.emit(&event);
    }

    fn record_request(&self, _result: &'static str) {
        #[cfg(feature = "tracing")]
        tracing::debug!(cache = %self.config.name, result = _result, "cache lookup");

        #[cfg(feature = "metrics")]
        counter!("cache_requests_total", "cache" => self.config.name.clone(), "result" => _result)
            .increment(1);
    }

    fn record_size(&self, _size: usize) {
        #[cfg(feature = "metrics")]
        gauge!("cache_size", "cache" => self.config.name.clone()).set(_size as f64);
    }
}

impl<K, V> std::fmt::Debug for QueryCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
