use super::{config, harness, harness_with_store};
use futures::future::BoxFuture;
use points_resilience_core::{FileStore, KeyValueStore, MemoryStore, StorageError};
use points_resilience_executor::{
    CreditRequest, ExecutionError, OfflineQueue, OperationStatus, TransactionRef,
};
use points_resilience_fanout::{DashboardSync, FanoutConfig, SyncBus};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A store whose writes fail.
struct ReadOnlyStore;

impl KeyValueStore for ReadOnlyStore {
    fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<String>, StorageError>> {
        Box::pin(async { Ok(None) })
    }

    fn set<'a>(&'a self, _key: &'a str, _value: String) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async { Err(StorageError::Unavailable("read-only volume".into())) })
    }

    fn remove<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async { Err(StorageError::Unavailable("read-only volume".into())) })
    }
}

#[tokio::test(start_paused = true)]
async fn failing_direct_with_no_endpoints_goes_offline() {
    let h = harness(false, |b| b).await;
    let request = CreditRequest::new("customer-1", "business-1", 50)
        .reason("visit")
        .metadata("store", "downtown");

    let result = h.executor.execute(request.clone()).await.unwrap();

    assert!(result.success);
    assert!(result.offline);
    assert!(!result.is_applied());
    assert_eq!(result.strategy_used, "offline");

    let queued = h.executor.queue().list().await.unwrap();
    assert_eq!(queued.len(), 1);
    let pending = &queued[0];
    assert_eq!(pending.payload, request);
    assert_eq!(pending.transaction_ref, result.identifiers.transaction_ref);
    assert_eq!(pending.status, OperationStatus::Pending);
    assert_eq!(pending.attempt_count, 0);
    assert_eq!(pending.recorded_by, "offline");
    assert_eq!(
        result.identifiers.pending_operation_id.as_deref(),
        Some(pending.id.as_str())
    );
    h.shutdown();
}

#[tokio::test]
async fn queued_payload_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let request = CreditRequest::new("customer-1", "business-1", 50)
        .reason("birthday bonus")
        .metadata("campaign", "spring")
        .metadata("cashier", "42")
        .transaction_ref(TransactionRef::new("order-5511"));

    {
        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let h = harness_with_store(false, store, |b| b).await;
        let result = h.executor.execute(request.clone()).await.unwrap();
        assert!(result.offline);
        h.shutdown();
    }

    let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let queue = OfflineQueue::new(store);
    let queued = queue.list().await.unwrap();

    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].payload, request);
    assert_eq!(queued[0].transaction_ref.as_str(), "order-5511");
    assert_eq!(queued[0].operation().request, request);
}

#[tokio::test(start_paused = true)]
async fn unwritable_queue_is_the_only_total_failure() {
    let h = harness_with_store(false, Arc::new(ReadOnlyStore), |b| b).await;

    let err = h
        .executor
        .execute(CreditRequest::new("c1", "b1", 5))
        .await
        .unwrap_err();

    let ExecutionError::Exhausted { diagnostics } = &err;
    let tried: Vec<_> = diagnostics.iter().map(|a| a.strategy.as_str()).collect();
    assert_eq!(tried, vec!["direct", "offline"]);
    assert!(diagnostics[1].error.as_deref().unwrap().contains("read-only volume"));
    assert_eq!(err.to_string(), "all 2 strategies failed");
    h.shutdown();
}

#[tokio::test(start_paused = true)]
async fn background_sync_applies_queued_credits_when_the_store_returns() {
    let replayed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&replayed);
    let h = harness(false, |b| {
        b.config(
            config()
                .sync_interval(Duration::from_secs(30))
                .on_replayed(move |id| sink.lock().unwrap().push(id.to_string()))
                .build(),
        )
    })
    .await;

    let first = h
        .executor
        .execute(CreditRequest::new("c1", "b1", 10))
        .await
        .unwrap();
    let second = h
        .executor
        .execute(CreditRequest::new("c1", "b1", 15))
        .await
        .unwrap();
    assert!(first.offline && second.offline);

    let sync = h.executor.offline_sync().spawn();

    // the supervisor reconnects 5s after the failed start
    h.ledger.set_available(true);
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(h.ledger.balance("c1", "b1"), 25);
    assert_eq!(h.executor.queue().pending_count().await.unwrap(), 0);
    assert_eq!(replayed.lock().unwrap().len(), 2);

    sync.abort();
    h.shutdown();
}

#[tokio::test(start_paused = true)]
async fn replay_keeps_stalled_credits_queued() {
    let h = harness(false, |b| {
        b.config(
            config()
                .max_sync_attempts(2)
                .sync_interval(Duration::from_secs(1))
                .max_replay_delay(Duration::from_secs(20))
                .build(),
        )
    })
    .await;
    h.executor
        .execute(CreditRequest::new("c1", "b1", 10))
        .await
        .unwrap();
    let sync = h.executor.offline_sync();

    let report = sync.sweep_once().await.unwrap();
    assert_eq!((report.applied, report.failed), (0, 1));
    tokio::time::sleep(Duration::from_secs(1)).await;
    let report = sync.sweep_once().await.unwrap();
    assert_eq!((report.applied, report.failed, report.stalled), (0, 1, 1));
    let report = sync.sweep_once().await.unwrap();
    assert_eq!((report.failed, report.deferred, report.stalled), (0, 1, 1));

    let queued = h.executor.queue().list().await.unwrap();
    assert_eq!(queued[0].status, OperationStatus::Failed);
    assert_eq!(queued[0].attempt_count, 2);
    assert!(queued[0].last_error.is_some());

    // stalled is not dropped: the next replay comes after the maximum delay
    tokio::time::sleep(Duration::from_secs(20)).await;
    let report = sync.sweep_once().await.unwrap();
    assert_eq!(report.applied + report.failed, 1);
    h.shutdown();
}

#[tokio::test(start_paused = true)]
async fn every_credit_queued_during_an_outage_is_applied_afterwards() {
    let h = harness(false, |b| {
        b.config(
            config()
                .max_sync_attempts(2)
                .sync_interval(Duration::from_secs(1))
                .max_replay_delay(Duration::from_secs(10))
                .build(),
        )
    })
    .await;
    let sync = h.executor.offline_sync().spawn();

    // more credits than replay attempts, each one waking the sync
    for customer in ["c1", "c2", "c3", "c4", "c5"] {
        let result = h
            .executor
            .execute(CreditRequest::new(customer, "b1", 2))
            .await
            .unwrap();
        assert!(result.offline);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // long enough for every credit to use up its attempts
    tokio::time::sleep(Duration::from_secs(20)).await;
    let queued = h.executor.queue().list().await.unwrap();
    assert_eq!(queued.len(), 5);
    assert!(queued.iter().all(|entry| entry.attempt_count >= 2));

    h.ledger.set_available(true);
    tokio::time::sleep(Duration::from_secs(60)).await;

    for customer in ["c1", "c2", "c3", "c4", "c5"] {
        assert_eq!(h.ledger.balance(customer, "b1"), 2);
    }
    assert_eq!(h.ledger.applied_count(), 5);
    assert!(h.executor.queue().list().await.unwrap().is_empty());

    sync.abort();
    h.shutdown();
}

#[tokio::test(start_paused = true)]
async fn queued_credits_are_announced_and_so_are_replays() {
    let fanout = DashboardSync::new(
        FanoutConfig::builder().without_redelivery().build(),
        SyncBus::new(),
    );
    let mut dashboard = fanout.subscribe();
    let h = harness(false, |b| b.fanout(fanout.clone())).await;

    let result = h
        .executor
        .execute(CreditRequest::new("c1", "b1", 10))
        .await
        .unwrap();
    let queued = dashboard.recv().await.unwrap();
    assert_eq!(queued.subject_id, "c1");
    assert_eq!(queued.identifiers["status"], "queued");
    assert_eq!(
        queued.identifiers["transaction_ref"],
        result.identifiers.transaction_ref.as_str()
    );

    h.ledger.set_available(true);
    tokio::time::sleep(Duration::from_secs(6)).await;
    let report = h.executor.offline_sync().sweep_once().await.unwrap();
    assert_eq!(report.applied, 1);

    let applied = dashboard.recv().await.unwrap();
    assert_eq!(applied.identifiers["status"], "applied");
    assert_eq!(applied.identifiers["strategy"], "direct");
    assert_eq!(applied.identifiers["new_balance"], "10");
    assert_ne!(applied.event_id, queued.event_id);
    h.shutdown();
}

#[tokio::test]
async fn queue_key_is_configurable() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let credits = OfflineQueue::with_key(Arc::clone(&store), "queue:credits:eu");
    let other = OfflineQueue::new(Arc::clone(&store));

    let operation =
        points_resilience_executor::CreditOperation::new(CreditRequest::new("c", "b", 1));
    credits.enqueue(&operation, "offline").await.unwrap();

    assert_eq!(credits.pending_count().await.unwrap(), 1);
    assert_eq!(other.pending_count().await.unwrap(), 0);
    assert_eq!(credits.key(), "queue:credits:eu");
}
