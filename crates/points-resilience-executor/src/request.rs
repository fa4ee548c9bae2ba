//! The credit payload and its idempotency key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Idempotency key carried unchanged by every attempt of one logical credit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRef(String);

impl TransactionRef {
    /// Wraps a caller-supplied reference.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Generates a fresh random reference.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The reference as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request to credit points to a customer's account at a business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditRequest {
    /// Customer receiving the points.
    pub customer_id: String,
    /// Business the points belong to.
    pub business_id: String,
    /// Points to credit.
    pub points: i64,
    /// Free-form reason recorded in the transaction log.
    #[serde(default)]
    pub reason: String,
    /// Caller-supplied idempotency key. Generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<TransactionRef>,
    /// Opaque caller metadata, persisted with the request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl CreditRequest {
    /// Creates a request with no reason, reference or metadata.
    pub fn new(
        customer_id: impl Into<String>,
        business_id: impl Into<String>,
        points: i64,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            business_id: business_id.into(),
            points,
            reason: String::new(),
            transaction_ref: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Sets the reason.
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Sets the idempotency key.
    pub fn transaction_ref(mut self, reference: TransactionRef) -> Self {
        self.transaction_ref = Some(reference);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One logical credit: the untouched request plus the reference resolved for
/// this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditOperation {
    /// The request exactly as submitted.
    pub request: CreditRequest,
    /// The caller's reference, or one generated once for this invocation.
    pub transaction_ref: TransactionRef,
}

impl CreditOperation {
    /// Resolves the transaction reference for `request`.
    pub fn new(request: CreditRequest) -> Self {
        let transaction_ref = request
            .transaction_ref
            .clone()
            .unwrap_or_else(TransactionRef::generate);
        Self {
            request,
            transaction_ref,
        }
    }
}
