//! Test organization:
//! - outage.rs: a store outage from the first credit to the last replay
//! - settings.rs: loading the stack from a settings file

mod outage;

use points_resilience::Settings;

/// Default settings with jitter and fanout redelivery turned off.
pub(crate) fn quiet_settings() -> Settings {
    let mut settings = Settings::default();
    settings.name = "it".to_string();
    settings.supervisor.reconnect_jitter_ms = 0;
    settings.supervisor.retry_jitter_ms = 0;
    settings.executor.direct_retries = 1;
    settings.fanout.redelivery_delays_ms.clear();
    settings
}
