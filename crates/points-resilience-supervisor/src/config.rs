use crate::client::ConnectionDescriptor;
use crate::events::SupervisorEvent;
use crate::state::ConnectionState;
use points_resilience_core::{
    EventListeners, ExponentialBackoff, FnListener, IntervalFunction, Jittered,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a [`ConnectionSupervisor`](crate::ConnectionSupervisor).
pub struct SupervisorConfig {
    pub(crate) name: String,
    pub(crate) descriptor: ConnectionDescriptor,
    pub(crate) health_check_interval: Duration,
    pub(crate) ping_timeout: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) max_reconnect_attempts: u32,
    pub(crate) reconnect_backoff: Arc<dyn IntervalFunction>,
    pub(crate) retry_backoff: Arc<dyn IntervalFunction>,
    pub(crate) event_listeners: EventListeners<SupervisorEvent>,
}

impl SupervisorConfig {
    /// Creates a new builder with default settings.
    pub fn builder() -> SupervisorConfigBuilder {
        SupervisorConfigBuilder::new()
    }

    /// Instance name used in events, logs and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptor handed to the connector.
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// Period between liveness pings while connected.
    pub fn health_check_interval(&self) -> Duration {
        self.health_check_interval
    }

    /// Deadline for a single liveness ping.
    pub fn ping_timeout(&self) -> Duration {
        self.ping_timeout
    }

    /// Deadline for opening a client handle.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Failed reconnection attempts tolerated before giving up.
    pub fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
    }

    /// Delay before reconnection attempt `attempt` (0-indexed).
    pub fn reconnect_delay(&self, attempt: usize) -> Duration {
        self.reconnect_backoff.next_interval(attempt)
    }

    /// Delay before retry `attempt` (0-indexed) of a retried operation.
    pub fn retry_delay(&self, attempt: usize) -> Duration {
        self.retry_backoff.next_interval(attempt)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfigBuilder::new().build()
    }
}

impl fmt::Debug for SupervisorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorConfig")
            .field("name", &self.name)
            .field("store", &self.descriptor.display_name())
            .field("health_check_interval", &self.health_check_interval)
            .field("ping_timeout", &self.ping_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("event_listeners", &self.event_listeners.len())
            .finish()
    }
}

/// Builder for [`SupervisorConfig`].
pub struct SupervisorConfigBuilder {
    name: String,
    descriptor: ConnectionDescriptor,
    health_check_interval: Duration,
    ping_timeout: Duration,
    connect_timeout: Duration,
    max_reconnect_attempts: u32,
    reconnect_base: Duration,
    reconnect_multiplier: f64,
    reconnect_max_delay: Duration,
    reconnect_jitter: Duration,
    retry_base: Duration,
    retry_jitter: Duration,
    custom_reconnect_backoff: Option<Arc<dyn IntervalFunction>>,
    custom_retry_backoff: Option<Arc<dyn IntervalFunction>>,
    event_listeners: EventListeners<SupervisorEvent>,
}

impl Default for SupervisorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SupervisorConfigBuilder {
    /// Creates a builder with defaults.
    ///
    /// Defaults:
    /// - health check every 30s, ping timeout 5s, connect timeout 10s
    /// - reconnect delay `min(5s × 1.5^attempts, 60s) + jitter(0..1s)`
    /// - at most 10 reconnection attempts
    /// - retry delay `500ms × 2^attempt + jitter(0..500ms)`
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            descriptor: ConnectionDescriptor::default(),
            health_check_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            max_reconnect_attempts: 10,
            reconnect_base: Duration::from_secs(5),
            reconnect_multiplier: 1.5,
            reconnect_max_delay: Duration::from_secs(60),
            reconnect_jitter: Duration::from_secs(1),
            retry_base: Duration::from_millis(500),
            retry_jitter: Duration::from_millis(500),
            custom_reconnect_backoff: None,
            custom_retry_backoff: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the instance name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the descriptor handed to the connector.
    pub fn descriptor(mut self, descriptor: ConnectionDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    /// Sets the period between liveness pings while connected.
    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Sets the deadline for one liveness ping.
    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Sets the deadline for opening a client handle.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets how many failed reconnection attempts are tolerated before the
    /// supervisor settles in `Disconnected`.
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the base reconnection interval.
    pub fn reconnect_interval(mut self, base: Duration) -> Self {
        self.reconnect_base = base;
        self
    }

    /// Sets the reconnection growth factor.
    pub fn reconnect_multiplier(mut self, multiplier: f64) -> Self {
        self.reconnect_multiplier = multiplier;
        self
    }

    /// Caps the reconnection delay before jitter.
    pub fn max_reconnect_delay(mut self, max: Duration) -> Self {
        self.reconnect_max_delay = max;
        self
    }

    /// Sets the upper bound of the random delay added to each reconnection.
    pub fn reconnect_jitter(mut self, jitter: Duration) -> Self {
        self.reconnect_jitter = jitter;
        self
    }

    /// Replaces the reconnection schedule entirely.
    pub fn reconnect_backoff<I>(mut self, backoff: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.custom_reconnect_backoff = Some(Arc::new(backoff));
        self
    }

    /// Sets the base delay of retried operations.
    pub fn retry_base_delay(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// Sets the upper bound of the random delay added to each retry.
    pub fn retry_jitter(mut self, jitter: Duration) -> Self {
        self.retry_jitter = jitter;
        self
    }

    /// Replaces the retry schedule entirely.
    pub fn retry_backoff<I>(mut self, backoff: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.custom_retry_backoff = Some(Arc::new(backoff));
        self
    }

    /// Disables jitter on both schedules. Useful for deterministic tests.
    pub fn without_jitter(mut self) -> Self {
        self.reconnect_jitter = Duration::ZERO;
        self.retry_jitter = Duration::ZERO;
        self
    }

    /// Registers a callback for state transitions: `(from, to)`.
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(ConnectionState, ConnectionState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let SupervisorEvent::StateTransition { from, to, .. } = event {
                f(*from, *to);
            }
        }));
        self
    }

    /// Registers a callback invoked before each reconnection sleep:
    /// `(attempt, delay)` with `attempt` starting at 1.
    pub fn on_reconnect_scheduled<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let SupervisorEvent::ReconnectScheduled { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback for terminal reconnection failure.
    pub fn on_reconnect_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let SupervisorEvent::ReconnectFailed { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback for each retry of a retried operation.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let SupervisorEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback for failed periodic liveness pings.
    pub fn on_health_check_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let SupervisorEvent::HealthCheckFailed { error, .. } = event {
                f(error);
            }
        }));
        self
    }

    /// Registers a listener receiving every supervisor event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&SupervisorEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> SupervisorConfig {
        let reconnect_backoff = self.custom_reconnect_backoff.unwrap_or_else(|| {
            Arc::new(Jittered::new(
                ExponentialBackoff::new(self.reconnect_base)
                    .multiplier(self.reconnect_multiplier)
                    .max_interval(self.reconnect_max_delay),
                self.reconnect_jitter,
            ))
        });

        let retry_backoff = self.custom_retry_backoff.unwrap_or_else(|| {
            Arc::new(Jittered::new(
                ExponentialBackoff::new(self.retry_base),
                self.retry_jitter,
            ))
        });

        SupervisorConfig {
            name: self.name,
            descriptor: self.descriptor,
            health_check_interval: self.health_check_interval,
            ping_timeout: self.ping_timeout,
            connect_timeout: self.connect_timeout,
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_backoff,
            retry_backoff,
            event_listeners: self.event_listeners,
        }
    }
}
