//! Configuration for the guaranteed executor.

use crate::events::ExecutorEvent;
use points_resilience_core::{EventListeners, ExponentialBackoff, FnListener, IntervalFunction};
use std::time::Duration;

/// Configuration for a [`GuaranteedExecutor`](crate::GuaranteedExecutor)
/// and its [`OfflineSync`](crate::OfflineSync).
pub struct ExecutorConfig {
    pub(crate) name: String,
    pub(crate) endpoint_timeout: Duration,
    pub(crate) direct_retries: usize,
    pub(crate) client_simulation: bool,
    pub(crate) max_sync_attempts: u32,
    pub(crate) sync_interval: Duration,
    pub(crate) max_replay_delay: Duration,
    pub(crate) operation_type: String,
    pub(crate) event_listeners: EventListeners<ExecutorEvent>,
}

impl ExecutorConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Timeout for endpoints that do not set their own.
    pub fn endpoint_timeout(&self) -> Duration {
        self.endpoint_timeout
    }

    /// Attempts made by the direct-write strategy.
    pub fn direct_retries(&self) -> usize {
        self.direct_retries
    }

    /// Whether the client-simulation strategy is in the chain.
    pub fn client_simulation(&self) -> bool {
        self.client_simulation
    }

    /// Failed replays after which a queued operation counts as stalled.
    pub fn max_sync_attempts(&self) -> u32 {
        self.max_sync_attempts
    }

    /// Period of the background sync.
    pub fn sync_interval(&self) -> Duration {
        self.sync_interval
    }

    /// Longest wait before a failed replay is tried again.
    pub fn max_replay_delay(&self) -> Duration {
        self.max_replay_delay
    }

    /// Wait before replaying an operation that has failed `attempt_count`
    /// times: the sync interval doubling per failure, capped at the maximum
    /// replay delay. Stalled operations wait the full maximum.
    pub fn replay_delay(&self, attempt_count: u32) -> Duration {
        if attempt_count >= self.max_sync_attempts {
            return self.max_replay_delay;
        }
        ExponentialBackoff::new(self.sync_interval)
            .max_interval(self.max_replay_delay)
            .next_interval(attempt_count.saturating_sub(1) as usize)
    }

    /// `operation_type` of the events sent to the fanout.
    pub fn operation_type(&self) -> &str {
        &self.operation_type
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfigBuilder::new().build()
    }
}

impl std::fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field("name", &self.name)
            .field("endpoint_timeout", &self.endpoint_timeout)
            .field("direct_retries", &self.direct_retries)
            .field("client_simulation", &self.client_simulation)
            .field("max_sync_attempts", &self.max_sync_attempts)
            .field("sync_interval", &self.sync_interval)
            .field("max_replay_delay", &self.max_replay_delay)
            .field("operation_type", &self.operation_type)
            .finish()
    }
}

/// Builder for [`ExecutorConfig`].
pub struct ExecutorConfigBuilder {
    name: String,
    endpoint_timeout: Duration,
    direct_retries: usize,
    client_simulation: bool,
    max_sync_attempts: u32,
    sync_interval: Duration,
    max_replay_delay: Duration,
    operation_type: String,
    event_listeners: EventListeners<ExecutorEvent>,
}

impl Default for ExecutorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            endpoint_timeout: Duration::from_secs(10),
            direct_retries: 2,
            client_simulation: false,
            max_sync_attempts: 5,
            sync_interval: Duration::from_secs(60),
            max_replay_delay: Duration::from_secs(30 * 60),
            operation_type: String::from("points_credited"),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name of this executor for observability.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the timeout for endpoints without their own.
    ///
    /// Default: 10 seconds
    pub fn endpoint_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint_timeout = timeout;
        self
    }

    /// Sets the attempts made by the direct-write strategy.
    ///
    /// Default: 2
    pub fn direct_retries(mut self, retries: usize) -> Self {
        self.direct_retries = retries;
        self
    }

    /// Adds the client-simulation strategy before the offline queue.
    ///
    /// Default: disabled
    pub fn client_simulation(mut self, enabled: bool) -> Self {
        self.client_simulation = enabled;
        self
    }

    /// Sets how many failed replays a queued operation gets before it is
    /// reported as stalled. Stalled operations stay queued and are retried
    /// every maximum replay delay.
    ///
    /// Default: 5
    pub fn max_sync_attempts(mut self, attempts: u32) -> Self {
        self.max_sync_attempts = attempts;
        self
    }

    /// Sets the period of the background sync.
    ///
    /// Default: 60 seconds
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Caps the wait between replays of a failing operation.
    ///
    /// Default: 30 minutes
    pub fn max_replay_delay(mut self, delay: Duration) -> Self {
        self.max_replay_delay = delay;
        self
    }

    /// Sets the `operation_type` of fanout events.
    ///
    /// Default: `"points_credited"`
    pub fn operation_type(mut self, operation_type: impl Into<String>) -> Self {
        self.operation_type = operation_type.into();
        self
    }

    /// Registers a callback for failed strategies: `(strategy, error)`.
    pub fn on_strategy_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ExecutorEvent::StrategyFailed { strategy, error, .. } = event {
                f(strategy, error);
            }
        }));
        self
    }

    /// Registers a callback for the strategy that satisfied a request.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ExecutorEvent::StrategySucceeded { strategy, .. } = event {
                f(strategy);
            }
        }));
        self
    }

    /// Registers a callback for queued operations applied by the sync.
    pub fn on_replayed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ExecutorEvent::Replayed {
                pending_operation_id,
                ..
            } = event
            {
                f(pending_operation_id);
            }
        }));
        self
    }

    /// Registers a listener receiving every executor event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecutorEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ExecutorConfig {
        ExecutorConfig {
            name: self.name,
            endpoint_timeout: self.endpoint_timeout,
            direct_retries: self.direct_retries,
            client_simulation: self.client_simulation,
            max_sync_attempts: self.max_sync_attempts,
            sync_interval: self.sync_interval,
            max_replay_delay: self.max_replay_delay,
            operation_type: self.operation_type,
            event_listeners: self.event_listeners,
        }
    }
}
