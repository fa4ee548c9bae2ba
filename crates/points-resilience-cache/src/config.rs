//! Configuration for the query cache.

use crate::events::CacheEvent;
use points_resilience_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a [`QueryCache`](crate::QueryCache).
pub struct CacheConfig {
    pub(crate) name: String,
    pub(crate) default_ttl: Duration,
    pub(crate) event_listeners: EventListeners<CacheEvent>,
}

impl CacheConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    /// Instance name used in events, logs and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// TTL applied when [`SetOptions`](crate::SetOptions) carries none.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfigBuilder::new().build()
    }
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("name", &self.name)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

/// Builder for configuring and constructing a cache.
pub struct CacheConfigBuilder {
    name: String,
    default_ttl: Duration,
    event_listeners: EventListeners<CacheEvent>,
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            default_ttl: Duration::from_secs(300),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name of this cache instance for observability.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the TTL used when a `set` call does not specify one.
    ///
    /// Default: 5 minutes
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Registers a callback for cache hits.
    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, CacheEvent::Hit { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback for cache misses, including expired reads.
    pub fn on_miss<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, CacheEvent::Miss { .. } | CacheEvent::Expired { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback for tag invalidation: `(tag, removed)`.
    pub fn on_tag_invalidated<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CacheEvent::TagInvalidated { tag, removed, .. } = event {
                f(tag, *removed);
            }
        }));
        self
    }

    /// Registers a listener receiving every cache event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CacheConfig {
        CacheConfig {
            name: self.name,
            default_ttl: self.default_ttl,
            event_listeners: self.event_listeners,
        }
    }
}
