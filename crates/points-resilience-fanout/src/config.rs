use crate::events::FanoutEvent;
use points_resilience_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for [`DashboardSync`](crate::DashboardSync).
pub struct FanoutConfig {
    pub(crate) name: String,
    pub(crate) topic: String,
    pub(crate) last_update_key: String,
    pub(crate) redelivery_delays: Vec<Duration>,
    pub(crate) event_listeners: EventListeners<FanoutEvent>,
}

impl FanoutConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> FanoutConfigBuilder {
        FanoutConfigBuilder::new()
    }

    /// Bus topic events are published on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Storage key of the last-update record.
    pub fn last_update_key(&self) -> &str {
        &self.last_update_key
    }

    /// Delays after the first delivery at which the event is sent again.
    pub fn redelivery_delays(&self) -> &[Duration] {
        &self.redelivery_delays
    }
}

impl Default for FanoutConfig {
    fn default() -> Self {
        FanoutConfigBuilder::new().build()
    }
}

impl std::fmt::Debug for FanoutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutConfig")
            .field("name", &self.name)
            .field("topic", &self.topic)
            .field("last_update_key", &self.last_update_key)
            .field("redelivery_delays", &self.redelivery_delays)
            .finish()
    }
}

/// Builder for [`FanoutConfig`].
pub struct FanoutConfigBuilder {
    name: String,
    topic: String,
    last_update_key: String,
    redelivery_delays: Vec<Duration>,
    event_listeners: EventListeners<FanoutEvent>,
}

impl Default for FanoutConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FanoutConfigBuilder {
    /// Creates a builder with defaults: topic `"dashboard-sync"`, record key
    /// `"dashboard:last-update"`, redelivery at +2s and +5s.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            topic: String::from("dashboard-sync"),
            last_update_key: String::from("dashboard:last-update"),
            redelivery_delays: vec![Duration::from_secs(2), Duration::from_secs(5)],
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the instance name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the bus topic.
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Sets the storage key of the last-update record.
    pub fn last_update_key(mut self, key: impl Into<String>) -> Self {
        self.last_update_key = key.into();
        self
    }

    /// Replaces the redelivery schedule. Delays are measured from the first
    /// delivery.
    pub fn redelivery_delays(mut self, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.redelivery_delays = delays.into_iter().collect();
        self
    }

    /// Disables delayed redelivery.
    pub fn without_redelivery(mut self) -> Self {
        self.redelivery_delays.clear();
        self
    }

    /// Registers a callback for failed channel deliveries: `(channel, error)`.
    pub fn on_delivery_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FanoutEvent::DeliveryFailed { channel, error, .. } = event {
                f(channel, error);
            }
        }));
        self
    }

    /// Registers a listener receiving every fanout event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&FanoutEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> FanoutConfig {
        FanoutConfig {
            name: self.name,
            topic: self.topic,
            last_update_key: self.last_update_key,
            redelivery_delays: self.redelivery_delays,
            event_listeners: self.event_listeners,
        }
    }
}
