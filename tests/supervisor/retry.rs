use crate::support::{EventLog, ScriptedStore, scripted_supervisor};
use points_resilience_supervisor::{ConnectionState, StoreError, SupervisorError, SupervisorEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_with_backoff() {
    let store = ScriptedStore::new();
    let log = EventLog::new();
    let supervisor = scripted_supervisor(&store, &log);
    supervisor.initialize().await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let start = Instant::now();
    let value = supervisor
        .execute_with_retry(
            move |_client| {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(StoreError::Query("deadlock detected".into()))
                    } else {
                        Ok(n)
                    }
                }
            },
            3,
        )
        .await
        .unwrap();

    assert_eq!(value, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 500ms then 1s
    assert_eq!(start.elapsed(), Duration::from_millis(1_500));

    let retries: Vec<_> = log
        .events()
        .into_iter()
        .filter_map(|event| match event {
            SupervisorEvent::Retry { attempt, delay, .. } => Some((attempt, delay)),
            _ => None,
        })
        .collect();
    assert_eq!(
        retries,
        vec![(1, Duration::from_millis(500)), (2, Duration::from_secs(1))]
    );

    // query errors say nothing about the connection
    assert_eq!(supervisor.state(), ConnectionState::Connected);
    supervisor.shutdown();
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_return_the_last_error() {
    let store = ScriptedStore::new();
    let log = EventLog::new();
    let supervisor = scripted_supervisor(&store, &log);
    supervisor.initialize().await.unwrap();

    let err = supervisor
        .execute_with_retry(
            |_client| async { Err::<(), _>(StoreError::Query("constraint violated".into())) },
            2,
        )
        .await
        .unwrap_err();

    match err {
        SupervisorError::RetriesExhausted { attempts, source } => {
            assert_eq!(attempts, 2);
            assert!(matches!(source, StoreError::Query(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    supervisor.shutdown();
}

#[tokio::test(start_paused = true)]
async fn transient_connection_error_recovers_without_reconnecting() {
    let store = ScriptedStore::new();
    let log = EventLog::new();
    let supervisor = scripted_supervisor(&store, &log);
    supervisor.initialize().await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let value = supervisor
        .execute_with_retry(
            move |_client| {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(StoreError::Connection("connection reset by peer".into()))
                    } else {
                        Ok("credited")
                    }
                }
            },
            3,
        )
        .await
        .unwrap();

    assert_eq!(value, "credited");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(supervisor.state(), ConnectionState::Connected);
    assert_eq!(store.connect_calls(), 1);
    assert!(!log.events().iter().any(|event| matches!(
        event,
        SupervisorEvent::StateTransition {
            to: ConnectionState::Reconnecting,
            ..
        }
    )));
    supervisor.shutdown();
}

#[tokio::test(start_paused = true)]
async fn connection_errors_trigger_reconnection() {
    // the post-failure connection check comes back empty
    let store = ScriptedStore::new().pings(&[1, 0]);
    let log = EventLog::new();
    let supervisor = scripted_supervisor(&store, &log);
    supervisor.initialize().await.unwrap();

    let err = supervisor
        .execute_with_retry(
            |_client| async { Err::<(), _>(StoreError::Connection("socket closed".into())) },
            1,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::RetriesExhausted { attempts: 1, .. }));
    assert_eq!(supervisor.state(), ConnectionState::Reconnecting);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(supervisor.state(), ConnectionState::Connected);

    let value = supervisor
        .execute_with_retry(|_client| async { Ok::<_, StoreError>("ok") }, 1)
        .await
        .unwrap();
    assert_eq!(value, "ok");
    supervisor.shutdown();
}

#[tokio::test(start_paused = true)]
async fn operations_wait_out_a_reconnection() {
    let store = ScriptedStore::new().connects(&[false]);
    let log = EventLog::new();
    let supervisor = scripted_supervisor(&store, &log);
    assert!(supervisor.initialize().await.is_err());

    // no client until the 5s reconnect lands; 500ms + 1s + 2s + 4s of retries
    let value = supervisor
        .execute_with_retry(|_client| async { Ok::<_, StoreError>(7) }, 5)
        .await
        .unwrap();

    assert_eq!(value, 7);
    assert_eq!(supervisor.state(), ConnectionState::Connected);
    supervisor.shutdown();
}
