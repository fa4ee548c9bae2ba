//! Connection supervisor metrics

use super::helpers::*;
use points_resilience_executor::InMemoryLedger;
use points_resilience_supervisor::{ConnectionSupervisor, SupervisorConfig};
use serial_test::serial;
use std::time::Duration;

#[tokio::test(start_paused = true)]
#[serial]
async fn supervisor_transition_and_reconnect_metrics() {
    init_recorder();
    let labels = [("supervisor", "metrics_supervisor")];

    let ledger = InMemoryLedger::new();
    let supervisor = ConnectionSupervisor::new(
        ledger.clone(),
        SupervisorConfig::builder()
            .name("metrics_supervisor")
            .without_jitter()
            .build(),
    );
    supervisor.initialize().await.unwrap();

    assert_counter_exists("supervisor_state_transitions_total");
    assert_metric_has_label(
        "supervisor_state_transitions_total",
        "supervisor",
        "metrics_supervisor",
    );
    assert_metric_has_label("supervisor_state_transitions_total", "to", "connected");
    assert_gauge_exists("supervisor_connected");
    assert_eq!(gauge_value("supervisor_connected", &labels), Some(1.0));

    ledger.set_available(false);
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_counter_exists("supervisor_reconnect_attempts_total");
    assert_metric_has_label(
        "supervisor_reconnect_attempts_total",
        "supervisor",
        "metrics_supervisor",
    );
    assert_metric_has_label("supervisor_state_transitions_total", "to", "reconnecting");
    assert_eq!(gauge_value("supervisor_connected", &labels), Some(0.0));
    supervisor.shutdown();
}
