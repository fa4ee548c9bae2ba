use points_resilience_core::ComponentEvent;
use tokio::time::Instant;

/// Events emitted by the fanout, one per channel delivery.
#[derive(Debug, Clone)]
pub enum FanoutEvent {
    /// A channel accepted the event.
    Delivered {
        name: String,
        timestamp: Instant,
        channel: &'static str,
        event_id: uuid::Uuid,
    },
    /// A channel failed; the others were still attempted.
    DeliveryFailed {
        name: String,
        timestamp: Instant,
        channel: &'static str,
        event_id: uuid::Uuid,
        error: String,
    },
}

impl ComponentEvent for FanoutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FanoutEvent::Delivered { .. } => "delivered",
            FanoutEvent::DeliveryFailed { .. } => "delivery_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            FanoutEvent::Delivered { timestamp, .. }
            | FanoutEvent::DeliveryFailed { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        match self {
            FanoutEvent::Delivered { name, .. } | FanoutEvent::DeliveryFailed { name, .. } => {
                name
            }
        }
    }
}
