use super::quiet_settings;
use points_resilience::cache::SetOptions;
use points_resilience::core::MemoryStore;
use points_resilience::executor::{CreditRequest, InMemoryLedger};
use points_resilience::supervisor::ConnectionState;
use points_resilience::{ResilienceStack, customer_tag};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn credits_survive_an_outage_and_dashboards_follow() {
    let ledger = InMemoryLedger::new();
    let stack: ResilienceStack<_, i64> = ResilienceStack::new(
        ledger.clone(),
        &quiet_settings(),
        Arc::new(MemoryStore::new()),
    );
    stack.start().await.unwrap();
    let mut dashboard = stack.fanout().subscribe();

    // healthy: applied directly
    let applied = stack
        .credit(CreditRequest::new("c1", "b1", 10))
        .await
        .unwrap();
    assert!(applied.is_applied());
    assert_eq!(
        dashboard.recv_unique().await.unwrap().identifiers["status"],
        "applied"
    );

    // the store goes away; the next health check notices
    ledger.set_available(false);
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(stack.supervisor().state(), ConnectionState::Reconnecting);

    stack.cache().set(
        "balance:c1".to_string(),
        10,
        SetOptions::new().tag(customer_tag("c1")),
    );
    let queued = stack
        .credit(CreditRequest::new("c1", "b1", 5))
        .await
        .unwrap();
    assert!(queued.offline);
    assert_eq!(
        dashboard.recv_unique().await.unwrap().identifiers["status"],
        "queued"
    );
    // the completion event already dropped the stale balance
    assert_eq!(stack.cache().get(&"balance:c1".to_string()), None);

    // the store comes back; reconnection and the next sync sweep catch up
    ledger.set_available(true);
    tokio::time::sleep(Duration::from_secs(90)).await;

    assert_eq!(stack.supervisor().state(), ConnectionState::Connected);
    assert_eq!(ledger.balance("c1", "b1"), 15);
    assert_eq!(stack.executor().queue().pending_count().await.unwrap(), 0);
    assert_eq!(
        dashboard.recv_unique().await.unwrap().identifiers["status"],
        "applied"
    );

    let last = stack.fanout().last_update().await.unwrap().unwrap();
    assert_eq!(last.event.identifiers["new_balance"], "15");
    stack.shutdown();
}

#[tokio::test(start_paused = true)]
async fn starting_while_the_store_is_down_still_accepts_credits() {
    let ledger = InMemoryLedger::new();
    ledger.set_available(false);
    let stack: ResilienceStack<_, i64> = ResilienceStack::new(
        ledger.clone(),
        &quiet_settings(),
        Arc::new(MemoryStore::new()),
    );

    assert!(stack.start().await.is_err());
    assert_eq!(stack.supervisor().state(), ConnectionState::Reconnecting);

    let result = stack
        .credit(CreditRequest::new("c9", "b1", 3))
        .await
        .unwrap();
    assert!(result.offline);

    ledger.set_available(true);
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(ledger.balance("c9", "b1"), 3);
    assert_eq!(ledger.applied_count(), 1);
    stack.shutdown();
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_background_work() {
    let ledger = InMemoryLedger::new();
    ledger.set_available(false);
    let stack: ResilienceStack<_, i64> = ResilienceStack::new(
        ledger.clone(),
        &quiet_settings(),
        Arc::new(MemoryStore::new()),
    );
    let _ = stack.start().await;
    stack
        .credit(CreditRequest::new("c1", "b1", 3))
        .await
        .unwrap();

    stack.shutdown();
    ledger.set_available(true);
    tokio::time::sleep(Duration::from_secs(300)).await;

    assert_eq!(ledger.applied_count(), 0);
    assert_eq!(stack.supervisor().state(), ConnectionState::Disconnected);
    assert_eq!(stack.executor().queue().pending_count().await.unwrap(), 1);
}
