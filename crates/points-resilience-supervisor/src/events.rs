use crate::state::ConnectionState;
use points_resilience_core::ComponentEvent;
use std::time::Duration;
use tokio::time::Instant;

/// Events emitted by the connection supervisor.
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    /// The connection state changed.
    StateTransition {
        name: String,
        timestamp: Instant,
        from: ConnectionState,
        to: ConnectionState,
    },
    /// A periodic liveness ping failed while connected.
    HealthCheckFailed {
        name: String,
        timestamp: Instant,
        error: String,
    },
    /// A reconnection attempt will run after `delay`.
    ReconnectScheduled {
        name: String,
        timestamp: Instant,
        attempt: u32,
        delay: Duration,
    },
    /// Reconnection succeeded after `attempts` failed tries.
    Reconnected {
        name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// Reconnection gave up; the supervisor is now terminally disconnected.
    ReconnectFailed {
        name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// A retried operation failed and will run again after `delay`.
    Retry {
        name: String,
        timestamp: Instant,
        attempt: usize,
        delay: Duration,
    },
    /// A retried operation failed on every attempt.
    RetriesExhausted {
        name: String,
        timestamp: Instant,
        attempts: usize,
    },
}

impl ComponentEvent for SupervisorEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupervisorEvent::StateTransition { .. } => "state_transition",
            SupervisorEvent::HealthCheckFailed { .. } => "health_check_failed",
            SupervisorEvent::ReconnectScheduled { .. } => "reconnect_scheduled",
            SupervisorEvent::Reconnected { .. } => "reconnected",
            SupervisorEvent::ReconnectFailed { .. } => "reconnect_failed",
            SupervisorEvent::Retry { .. } => "retry",
            SupervisorEvent::RetriesExhausted { .. } => "retries_exhausted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            SupervisorEvent::StateTransition { timestamp, .. }
            | SupervisorEvent::HealthCheckFailed { timestamp, .. }
            | SupervisorEvent::ReconnectScheduled { timestamp, .. }
            | SupervisorEvent::Reconnected { timestamp, .. }
            | SupervisorEvent::ReconnectFailed { timestamp, .. }
            | SupervisorEvent::Retry { timestamp, .. }
            | SupervisorEvent::RetriesExhausted { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        match self {
            SupervisorEvent::StateTransition { name, .. }
            | SupervisorEvent::HealthCheckFailed { name, .. }
            | SupervisorEvent::ReconnectScheduled { name, .. }
            | SupervisorEvent::Reconnected { name, .. }
            | SupervisorEvent::ReconnectFailed { name, .. }
            | SupervisorEvent::Retry { name, .. }
            | SupervisorEvent::RetriesExhausted { name, .. } => name,
        }
    }
}
