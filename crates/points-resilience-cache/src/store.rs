//! Entry storage with a tag index.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// A cached value with its lifetime bounds.
#[derive(Clone, Debug)]
pub(crate) struct CacheEntry<V> {
    pub(crate) data: V,
    pub(crate) created_at: Instant,
    pub(crate) expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

/// Outcome of a lookup.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Lookup<V> {
    Hit(V),
    Miss,
    Expired,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Entries held, expired or not.
    pub size: usize,
    /// Entries not yet expired.
    pub active_entries: usize,
    /// Entries past expiry that have not been read or pruned yet.
    pub expired_entries: usize,
    /// Tags currently referencing at least one key.
    pub tag_count: usize,
}

/// Entry map plus two indexes: tag → keys and key → tags.
///
/// Every key in a tag set has an entry and every entry's reverse set names
/// exactly the tags that reference it. Empty tag sets are dropped.
pub(crate) struct TaggedStore<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    tags: HashMap<String, HashSet<K>>,
    key_tags: HashMap<K, HashSet<String>>,
}

impl<K, V> TaggedStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            tags: HashMap::new(),
            key_tags: HashMap::new(),
        }
    }

    /// Stores `data` under `key`, replacing any previous entry and tag set.
    pub(crate) fn insert(
        &mut self,
        key: K,
        data: V,
        ttl: Duration,
        tags: &[String],
        now: Instant,
    ) {
        self.detach(&key);

        for tag in tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
        if !tags.is_empty() {
            self.key_tags
                .insert(key.clone(), tags.iter().cloned().collect());
        }

        let expires_at = now.checked_add(ttl).unwrap_or_else(|| far_future(now));
        self.entries.insert(
            key,
            CacheEntry {
                data,
                created_at: now,
                expires_at,
            },
        );
    }

    pub(crate) fn get(&mut self, key: &K, now: Instant) -> Lookup<V> {
        let Some(entry) = self.entries.get(key) else {
            return Lookup::Miss;
        };
        if !entry.is_expired(now) {
            return Lookup::Hit(entry.data.clone());
        }

        self.remove(key);
        Lookup::Expired
    }

    pub(crate) fn contains(&mut self, key: &K, now: Instant) -> bool {
        !matches!(self.get(key, now), Lookup::Miss | Lookup::Expired)
    }

    /// True when the entry exists, has not expired and is no older than
    /// `stale_threshold`.
    pub(crate) fn is_fresh(&mut self, key: &K, stale_threshold: Duration, now: Instant) -> bool {
        let Some(entry) = self.entries.get(key) else {
            return false;
        };
        if !entry.is_expired(now) {
            return entry.age(now) <= stale_threshold;
        }

        self.remove(key);
        false
    }

    /// Removes `key` and every tag reference to it.
    pub(crate) fn remove(&mut self, key: &K) -> bool {
        self.detach(key);
        self.entries.remove(key).is_some()
    }

    /// Removes every key referenced by `tag`, then the tag itself.
    pub(crate) fn remove_tag(&mut self, tag: &str) -> usize {
        let Some(keys) = self.tags.remove(tag) else {
            return 0;
        };

        let mut removed = 0;
        for key in keys {
            if self.remove(&key) {
                removed += 1;
            }
        }
        removed
    }

    /// Deletes every expired entry.
    pub(crate) fn prune(&mut self, now: Instant) -> usize {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.tags.clear();
        self.key_tags.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn stats(&self, now: Instant) -> CacheStats {
        let expired_entries = self
            .entries
            .values()
            .filter(|entry| entry.is_expired(now))
            .count();

        CacheStats {
            size: self.entries.len(),
            active_entries: self.entries.len() - expired_entries,
            expired_entries,
            tag_count: self.tags.len(),
        }
    }

    /// Tags currently attached to `key`.
    pub(crate) fn tags_of(&self, key: &K) -> Vec<String> {
        let mut tags: Vec<String> = self
            .key_tags
            .get(key)
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default();
        tags.sort();
        tags
    }

    /// Drops `key` from every tag set that references it.
    fn detach(&mut self, key: &K) {
        let Some(previous) = self.key_tags.remove(key) else {
            return;
        };

        for tag in previous {
            if let Entry::Occupied(mut keys) = self.tags.entry(tag) {
                keys.get_mut().remove(key);
                if keys.get().is_empty() {
                    keys.remove();
                }
            }
        }
    }
}

/// Roughly thirty years out; used when `now + ttl` overflows.
fn far_future(now: Instant) -> Instant {
    now + Duration::from_secs(86400 * 365 * 30)
}
