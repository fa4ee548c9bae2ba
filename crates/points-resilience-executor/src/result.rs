//! Outcomes of strategy attempts and executor invocations.

use crate::request::TransactionRef;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a successful strategy produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    /// Sink-assigned transaction id, when the sink reports one.
    pub transaction_id: Option<String>,
    /// Balance after the credit, when the sink reports one.
    pub new_balance: Option<i64>,
    /// Accepted for later application rather than applied.
    pub offline: bool,
    /// A locally computed approximation awaiting reconciliation.
    pub provisional: bool,
    /// Queue entry recorded by this strategy, if any.
    pub pending_operation_id: Option<String>,
}

impl Applied {
    /// A credit confirmed by the sink.
    pub fn confirmed(transaction_id: impl Into<String>, new_balance: Option<i64>) -> Self {
        Self {
            transaction_id: Some(transaction_id.into()),
            new_balance,
            ..Self::default()
        }
    }

    /// A credit durably queued for later application.
    pub fn queued(pending_operation_id: impl Into<String>) -> Self {
        Self {
            offline: true,
            pending_operation_id: Some(pending_operation_id.into()),
            ..Self::default()
        }
    }
}

/// Identifiers returned to the caller and passed to the fanout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifiers {
    /// The idempotency key used by every attempt.
    pub transaction_ref: TransactionRef,
    /// Sink-assigned transaction id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Balance after the credit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<i64>,
    /// Offline queue entry, for queued and provisional results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_operation_id: Option<String>,
}

/// One entry of the diagnostics trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// Strategy name.
    pub strategy: String,
    /// Failure description; `None` for the successful attempt.
    pub error: Option<String>,
    /// Time spent in the attempt.
    pub elapsed: Duration,
}

impl Attempt {
    /// Whether this attempt succeeded.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of one [`GuaranteedExecutor::execute`](crate::GuaranteedExecutor::execute).
///
/// `offline: true` means "accepted, not yet applied": reads made right after
/// may not reflect the credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Always true; total failure is reported as an error.
    pub success: bool,
    /// Queued for later application.
    pub offline: bool,
    /// Locally approximated, awaiting reconciliation.
    pub provisional: bool,
    /// Name of the strategy that satisfied the request.
    pub strategy_used: String,
    /// Identifiers of the applied or queued credit.
    pub identifiers: Identifiers,
    /// Every attempt made, in order.
    pub diagnostics: Vec<Attempt>,
}

impl OperationResult {
    /// Applied now, not queued or simulated.
    pub fn is_applied(&self) -> bool {
        self.success && !self.offline && !self.provisional
    }
}
