//! Guaranteed executor and offline sync metrics

use super::helpers::*;
use points_resilience_core::MemoryStore;
use points_resilience_executor::{
    CreditRequest, ExecutorConfig, GuaranteedExecutor, InMemoryLedger, OfflineQueue,
};
use points_resilience_supervisor::{ConnectionSupervisor, SupervisorConfig};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
#[serial]
async fn executor_attempt_queue_and_sync_metrics() {
    init_recorder();

    let ledger = InMemoryLedger::new();
    ledger.set_available(false);
    let supervisor = ConnectionSupervisor::new(
        ledger.clone(),
        SupervisorConfig::builder().without_jitter().build(),
    );
    let _ = supervisor.initialize().await;

    let executor = GuaranteedExecutor::builder(OfflineQueue::with_key(
        Arc::new(MemoryStore::new()),
        "metrics:queue",
    ))
    .config(
        ExecutorConfig::builder()
            .name("metrics_executor")
            .direct_retries(1)
            .build(),
    )
    .direct(supervisor.clone())
    .build();

    executor
        .execute(CreditRequest::new("c1", "b1", 5))
        .await
        .unwrap();

    assert_counter_exists("credit_attempts_total");
    assert_metric_has_label("credit_attempts_total", "executor", "metrics_executor");
    assert_metric_has_label("credit_attempts_total", "strategy", "direct");
    assert_metric_has_label("credit_attempts_total", "result", "failure");
    assert_metric_has_label("credit_attempts_total", "strategy", "offline");
    assert_metric_has_label("credit_attempts_total", "result", "success");

    assert_gauge_exists("offline_queue_depth");
    assert_eq!(
        gauge_value("offline_queue_depth", &[("queue", "metrics:queue")]),
        Some(1.0)
    );

    ledger.set_available(true);
    tokio::time::sleep(Duration::from_secs(6)).await;
    executor.offline_sync().sweep_once().await.unwrap();

    assert_counter_exists("offline_sync_total");
    assert_metric_has_label("offline_sync_total", "executor", "metrics_executor");
    assert_metric_has_label("offline_sync_total", "result", "applied");
    assert_eq!(
        gauge_value("offline_queue_depth", &[("queue", "metrics:queue")]),
        Some(0.0)
    );
    supervisor.shutdown();
}
