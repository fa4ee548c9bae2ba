use points_resilience_core::ComponentEvent;
use tokio::time::Instant;

/// Events emitted by the query cache.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A live entry was returned.
    Hit {
        /// The name of the cache instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
    /// No entry existed for the key.
    Miss {
        /// The name of the cache instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
    /// An entry was found past its expiry and deleted on read.
    Expired {
        /// The name of the cache instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
    /// A single key was invalidated.
    Invalidated {
        /// The name of the cache instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
    /// Every key under a tag was invalidated.
    TagInvalidated {
        /// The name of the cache instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The invalidated tag.
        tag: String,
        /// Entries removed.
        removed: usize,
    },
}

impl ComponentEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "cache_hit",
            CacheEvent::Miss { .. } => "cache_miss",
            CacheEvent::Expired { .. } => "cache_expired",
            CacheEvent::Invalidated { .. } => "cache_invalidated",
            CacheEvent::TagInvalidated { .. } => "cache_tag_invalidated",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. }
            | CacheEvent::Miss { timestamp, .. }
            | CacheEvent::Expired { timestamp, .. }
            | CacheEvent::Invalidated { timestamp, .. }
            | CacheEvent::TagInvalidated { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        match self {
            CacheEvent::Hit { name, .. }
            | CacheEvent::Miss { name, .. }
            | CacheEvent::Expired { name, .. }
            | CacheEvent::Invalidated { name, .. }
            | CacheEvent::TagInvalidated { name, .. } => name,
        }
    }
}
