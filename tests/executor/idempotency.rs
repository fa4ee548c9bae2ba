use super::harness;
use points_resilience_executor::{CreditOperation, CreditRequest, PointsLedger, TransactionRef};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn same_reference_twice_applies_once() {
    let h = harness(true, |b| b).await;
    let request =
        CreditRequest::new("c1", "b1", 20).transaction_ref(TransactionRef::new("order-1"));

    let first = h.executor.execute(request.clone()).await.unwrap();
    let second = h.executor.execute(request).await.unwrap();

    assert!(first.is_applied() && second.is_applied());
    assert_eq!(h.ledger.applied_count(), 1);
    assert_eq!(h.ledger.balance("c1", "b1"), 20);
    assert_eq!(
        first.identifiers.transaction_id,
        second.identifiers.transaction_id
    );
    assert_eq!(second.identifiers.new_balance, Some(20));
    h.shutdown();
}

#[tokio::test(start_paused = true)]
async fn generated_references_are_distinct() {
    let h = harness(true, |b| b).await;

    let a = h
        .executor
        .execute(CreditRequest::new("c1", "b1", 5))
        .await
        .unwrap();
    let b = h
        .executor
        .execute(CreditRequest::new("c1", "b1", 5))
        .await
        .unwrap();

    assert_ne!(a.identifiers.transaction_ref, b.identifiers.transaction_ref);
    assert_eq!(h.ledger.applied_count(), 2);
    assert_eq!(h.ledger.balance("c1", "b1"), 10);
    h.shutdown();
}

#[tokio::test(start_paused = true)]
async fn replaying_an_already_applied_credit_is_harmless() {
    let h = harness(false, |b| b).await;
    let request =
        CreditRequest::new("c1", "b1", 40).transaction_ref(TransactionRef::new("order-9"));

    // queued while the store looked unreachable
    let result = h.executor.execute(request.clone()).await.unwrap();
    assert!(result.offline);

    // the write had in fact landed
    h.ledger.set_available(true);
    h.ledger
        .credit(&CreditOperation::new(request))
        .await
        .unwrap();
    assert_eq!(h.ledger.applied_count(), 1);

    tokio::time::sleep(Duration::from_secs(6)).await;
    let report = h.executor.offline_sync().sweep_once().await.unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(h.ledger.applied_count(), 1);
    assert_eq!(h.ledger.balance("c1", "b1"), 40);
    assert_eq!(h.executor.queue().pending_count().await.unwrap(), 0);
    h.shutdown();
}

#[tokio::test(start_paused = true)]
async fn resubmitting_while_queued_keeps_one_entry() {
    let h = harness(false, |b| b).await;
    let request =
        CreditRequest::new("c1", "b1", 40).transaction_ref(TransactionRef::new("order-3"));

    let first = h.executor.execute(request.clone()).await.unwrap();
    let second = h.executor.execute(request).await.unwrap();

    assert_eq!(
        first.identifiers.pending_operation_id,
        second.identifiers.pending_operation_id
    );
    assert_eq!(h.executor.queue().pending_count().await.unwrap(), 1);
    h.shutdown();
}
