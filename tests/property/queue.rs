//! Property tests for the offline queue.
//!
//! Invariants tested:
//! - A queued payload reads back field-for-field identical
//! - Enqueueing a reference that is already queued adds nothing

use points_resilience_core::MemoryStore;
use points_resilience_executor::{CreditOperation, CreditRequest, OfflineQueue, TransactionRef};
use proptest::prelude::*;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn request_strategy() -> impl Strategy<Value = CreditRequest> {
    (
        "[a-z0-9-]{1,24}",
        "[a-z0-9-]{1,24}",
        -10_000i64..=10_000,
        ".{0,40}",
        prop::option::of("[a-z0-9-]{1,36}"),
        prop::collection::btree_map("[a-z_]{1,12}", ".{0,20}", 0..4),
    )
        .prop_map(|(customer, business, points, reason, reference, metadata)| {
            let mut request = CreditRequest::new(customer, business, points).reason(reason);
            if let Some(reference) = reference {
                request = request.transaction_ref(TransactionRef::new(reference));
            }
            for (key, value) in metadata {
                request = request.metadata(key, value);
            }
            request
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: payloads survive the queue unchanged
    #[test]
    fn queued_payload_reads_back_identical(request in request_strategy()) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let queue = OfflineQueue::new(Arc::new(MemoryStore::new()));
            let operation = CreditOperation::new(request.clone());
            let pending = queue.enqueue(&operation, "offline").await.unwrap();

            let stored = queue.get(&pending.id).await.unwrap().unwrap();
            prop_assert_eq!(&stored.payload, &request);
            prop_assert_eq!(&stored.transaction_ref, &operation.transaction_ref);
            prop_assert_eq!(stored.operation(), operation);

            Ok(())
        })?;
    }

    /// Property: one entry per transaction reference
    #[test]
    fn duplicate_references_collapse(request in request_strategy(), repeats in 1usize..5) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let queue = OfflineQueue::new(Arc::new(MemoryStore::new()));
            let operation = CreditOperation::new(request);

            let first = queue.enqueue(&operation, "offline").await.unwrap();
            for _ in 0..repeats {
                let again = queue
                    .enqueue(&operation, "client_simulation")
                    .await
                    .unwrap();
                prop_assert_eq!(&again.id, &first.id);
            }
            prop_assert_eq!(queue.pending_count().await.unwrap(), 1);

            Ok(())
        })?;
    }
}
