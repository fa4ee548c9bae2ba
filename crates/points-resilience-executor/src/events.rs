use points_resilience_core::ComponentEvent;
use std::time::Duration;
use tokio::time::Instant;

/// Events emitted by the executor and its background sync.
#[derive(Debug, Clone)]
pub enum ExecutorEvent {
    /// A strategy applied or accepted the credit.
    StrategySucceeded {
        name: String,
        timestamp: Instant,
        strategy: String,
        elapsed: Duration,
    },
    /// A strategy failed; the executor moves to the next one.
    StrategyFailed {
        name: String,
        timestamp: Instant,
        strategy: String,
        error: String,
        elapsed: Duration,
    },
    /// Every strategy failed, including the offline queue.
    Exhausted {
        name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// The background sync applied a queued credit.
    Replayed {
        name: String,
        timestamp: Instant,
        pending_operation_id: String,
        strategy: String,
    },
    /// The background sync could not apply a queued credit.
    ReplayFailed {
        name: String,
        timestamp: Instant,
        pending_operation_id: String,
        attempt_count: u32,
        error: String,
        /// Wait before the operation is tried again.
        retry_in: Duration,
        /// Set once the operation has used up its replay attempts.
        stalled: bool,
    },
}

impl ComponentEvent for ExecutorEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExecutorEvent::StrategySucceeded { .. } => "strategy_succeeded",
            ExecutorEvent::StrategyFailed { .. } => "strategy_failed",
            ExecutorEvent::Exhausted { .. } => "exhausted",
            ExecutorEvent::Replayed { .. } => "replayed",
            ExecutorEvent::ReplayFailed { .. } => "replay_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ExecutorEvent::StrategySucceeded { timestamp, .. }
            | ExecutorEvent::StrategyFailed { timestamp, .. }
            | ExecutorEvent::Exhausted { timestamp, .. }
            | ExecutorEvent::Replayed { timestamp, .. }
            | ExecutorEvent::ReplayFailed { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        match self {
            ExecutorEvent::StrategySucceeded { name, .. }
            | ExecutorEvent::StrategyFailed { name, .. }
            | ExecutorEvent::Exhausted { name, .. }
            | ExecutorEvent::Replayed { name, .. }
            | ExecutorEvent::ReplayFailed { name, .. } => name,
        }
    }
}
