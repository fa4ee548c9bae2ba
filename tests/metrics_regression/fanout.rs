//! Dashboard fanout metrics

use super::helpers::*;
use points_resilience_core::MemoryStore;
use points_resilience_fanout::{DashboardSync, FanoutConfig, SyncBus, SyncEvent};
use serial_test::serial;
use std::sync::Arc;

#[tokio::test]
#[serial]
async fn fanout_delivery_metrics() {
    init_recorder();

    let sync = DashboardSync::with_store(
        FanoutConfig::builder()
            .name("metrics_fanout")
            .without_redelivery()
            .build(),
        SyncBus::new(),
        Arc::new(MemoryStore::new()),
    );
    sync.register_callback(|_| {});
    sync.register_callback(|_| panic!("broken widget"));

    sync.notify(SyncEvent::new("c1", "points_credited")).await;

    assert_counter_exists("fanout_deliveries_total");
    assert_metric_has_label("fanout_deliveries_total", "fanout", "metrics_fanout");
    assert_metric_has_label("fanout_deliveries_total", "channel", "bus");
    assert_metric_has_label("fanout_deliveries_total", "channel", "last_update");
    assert_metric_has_label("fanout_deliveries_total", "channel", "callback");
    assert_metric_has_label("fanout_deliveries_total", "result", "ok");
    assert_metric_has_label("fanout_deliveries_total", "result", "error");
}
