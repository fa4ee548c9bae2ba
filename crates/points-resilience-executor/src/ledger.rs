//! The direct-write sink contract and an in-process ledger implementing it.

use crate::request::{CreditOperation, TransactionRef};
use chrono::{DateTime, Utc};
use points_resilience_supervisor::{
    ConnectionDescriptor, StoreClient, StoreConnector, StoreError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Sink acknowledgement of a credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Sink-assigned transaction id.
    pub transaction_id: String,
    /// Balance after the credit.
    pub new_balance: i64,
    /// True when the reference had already been applied and nothing changed.
    pub duplicate: bool,
}

/// A data-store client able to apply credits.
///
/// Implementations must apply the balance update and the transaction-log
/// append atomically, and must treat a repeated `transaction_ref` as a no-op
/// returning the original receipt (with `duplicate` set).
pub trait PointsLedger: StoreClient {
    /// Applies `operation` once.
    fn credit(
        &self,
        operation: &CreditOperation,
    ) -> impl Future<Output = Result<LedgerReceipt, StoreError>> + Send;
}

/// One row of the append-only transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction_id: String,
    pub transaction_ref: TransactionRef,
    pub customer_id: String,
    pub business_id: String,
    pub points: i64,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<(String, String), i64>,
    log: Vec<LedgerEntry>,
    applied: HashMap<TransactionRef, LedgerReceipt>,
}

struct LedgerInner {
    state: Mutex<LedgerState>,
    available: AtomicBool,
}

/// In-process points ledger with a uniqueness constraint on the transaction
/// reference.
///
/// Clones share state. The ledger doubles as its own [`StoreConnector`] and
/// [`StoreClient`], so it can sit behind a
/// [`ConnectionSupervisor`](points_resilience_supervisor::ConnectionSupervisor);
/// [`set_available`](Self::set_available) simulates an outage.
#[derive(Clone)]
pub struct InMemoryLedger {
    inner: Arc<LedgerInner>,
}

impl InMemoryLedger {
    /// Creates an empty, available ledger.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                state: Mutex::new(LedgerState::default()),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Makes the ledger reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Whether the ledger is reachable.
    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    /// Current balance of a customer at a business.
    pub fn balance(&self, customer_id: &str, business_id: &str) -> i64 {
        self.lock()
            .balances
            .get(&(customer_id.to_string(), business_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// The transaction log, oldest first.
    pub fn transactions(&self) -> Vec<LedgerEntry> {
        self.lock().log.clone()
    }

    /// Number of distinct credits applied.
    pub fn applied_count(&self) -> usize {
        self.lock().log.len()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn unavailable() -> StoreError {
        StoreError::Connection("ledger unavailable".to_string())
    }

    fn apply(&self, operation: &CreditOperation) -> Result<LedgerReceipt, StoreError> {
        if !self.is_available() {
            return Err(Self::unavailable());
        }

        let mut state = self.lock();
        if let Some(receipt) = state.applied.get(&operation.transaction_ref) {
            return Ok(LedgerReceipt {
                duplicate: true,
                ..receipt.clone()
            });
        }

        let request = &operation.request;
        let balance = state
            .balances
            .entry((request.customer_id.clone(), request.business_id.clone()))
            .or_insert(0);
        let new_balance = balance
            .checked_add(request.points)
            .ok_or_else(|| StoreError::Query("balance out of range".to_string()))?;
        *balance = new_balance;

        let transaction_id = format!("txn-{}", state.log.len() + 1);
        state.log.push(LedgerEntry {
            transaction_id: transaction_id.clone(),
            transaction_ref: operation.transaction_ref.clone(),
            customer_id: request.customer_id.clone(),
            business_id: request.business_id.clone(),
            points: request.points,
            reason: request.reason.clone(),
            recorded_at: Utc::now(),
        });

        let receipt = LedgerReceipt {
            transaction_id,
            new_balance,
            duplicate: false,
        };
        state
            .applied
            .insert(operation.transaction_ref.clone(), receipt.clone());
        Ok(receipt)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("available", &self.is_available())
            .field("applied", &self.applied_count())
            .finish()
    }
}

impl StoreClient for InMemoryLedger {
    fn ping(&self) -> impl Future<Output = Result<usize, StoreError>> + Send {
        let outcome = if self.is_available() {
            Ok(1)
        } else {
            Err(Self::unavailable())
        };
        async move { outcome }
    }
}

impl PointsLedger for InMemoryLedger {
    fn credit(
        &self,
        operation: &CreditOperation,
    ) -> impl Future<Output = Result<LedgerReceipt, StoreError>> + Send {
        let outcome = self.apply(operation);
        async move { outcome }
    }
}

impl StoreConnector for InMemoryLedger {
    type Client = InMemoryLedger;

    fn connect(
        &self,
        _descriptor: &ConnectionDescriptor,
    ) -> impl Future<Output = Result<InMemoryLedger, StoreError>> + Send {
        let outcome = if self.is_available() {
            Ok(self.clone())
        } else {
            Err(Self::unavailable())
        };
        async move { outcome }
    }
}
