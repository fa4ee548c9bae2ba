//! The completion event broadcast to observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A completed operation, as seen by dashboards and other observers.
///
/// Delivery is at-least-once; consumers de-duplicate on `event_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Unique per logical event; repeated deliveries share it.
    pub event_id: Uuid,
    /// The entity the operation applied to, e.g. a customer id.
    pub subject_id: String,
    /// Kind of operation, e.g. `"points_credited"`.
    pub operation_type: String,
    /// Identifiers produced by the operation (transaction ids, balances).
    pub identifiers: BTreeMap<String, String>,
    /// When the operation completed.
    pub timestamp: DateTime<Utc>,
}

impl SyncEvent {
    /// Creates an event stamped now with a fresh id.
    pub fn new(subject_id: impl Into<String>, operation_type: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            subject_id: subject_id.into(),
            operation_type: operation_type.into(),
            identifiers: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Adds an identifier.
    pub fn identifier(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.identifiers.insert(key.into(), value.to_string());
        self
    }
}

/// The persisted "last update" record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastUpdate {
    /// The most recent event.
    pub event: SyncEvent,
    /// When it was recorded.
    pub recorded_at: DateTime<Utc>,
}
