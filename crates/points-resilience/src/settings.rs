//! File-based settings for every component.
//!
//! All fields have defaults, so a settings file only lists what it changes.
//! Durations are written in milliseconds.
//!
//! ```rust
//! use points_resilience::Settings;
//!
//! let settings = Settings::from_json_str(r#"{
//!     "name": "points",
//!     "supervisor": { "url": "postgres://db/points", "max_reconnect_attempts": 3 },
//!     "executor": {
//!         "endpoints": [
//!             { "name": "edge", "url": "https://edge.example/credit", "timeout_ms": 2000 }
//!         ]
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(settings.supervisor.max_reconnect_attempts, 3);
//! assert_eq!(settings.cache.default_ttl_ms, 300_000);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Errors loading [`Settings`].
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The settings are not valid JSON for this schema.
    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings for the whole resilience layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Prefix of every component's instance name.
    pub name: String,
    pub supervisor: SupervisorSettings,
    pub cache: CacheSettings,
    pub executor: ExecutorSettings,
    pub fanout: FanoutSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: String::from("points"),
            supervisor: SupervisorSettings::default(),
            cache: CacheSettings::default(),
            executor: ExecutorSettings::default(),
            fanout: FanoutSettings::default(),
        }
    }
}

impl Settings {
    /// Parses settings from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads settings from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    fn component_name(&self, component: &str) -> String {
        format!("{}-{}", self.name, component)
    }
}

/// Connection supervisor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    pub url: String,
    pub label: Option<String>,
    pub health_check_interval_ms: u64,
    pub ping_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_reconnect_attempts: u32,
    pub reconnect_interval_ms: u64,
    pub reconnect_multiplier: f64,
    pub max_reconnect_delay_ms: u64,
    pub reconnect_jitter_ms: u64,
    pub retry_base_delay_ms: u64,
    pub retry_jitter_ms: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            label: None,
            health_check_interval_ms: 30_000,
            ping_timeout_ms: 5_000,
            connect_timeout_ms: 10_000,
            max_reconnect_attempts: 10,
            reconnect_interval_ms: 5_000,
            reconnect_multiplier: 1.5,
            max_reconnect_delay_ms: 60_000,
            reconnect_jitter_ms: 1_000,
            retry_base_delay_ms: 500,
            retry_jitter_ms: 500,
        }
    }
}

/// Query cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub default_ttl_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_ms: 300_000,
        }
    }
}

/// One alternate network endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Guaranteed executor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    pub endpoint_timeout_ms: u64,
    pub direct_retries: usize,
    pub client_simulation: bool,
    pub max_sync_attempts: u32,
    pub sync_interval_ms: u64,
    pub max_replay_delay_ms: u64,
    pub queue_key: String,
    pub endpoints: Vec<EndpointSettings>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            endpoint_timeout_ms: 10_000,
            direct_retries: 2,
            client_simulation: false,
            max_sync_attempts: 5,
            sync_interval_ms: 60_000,
            max_replay_delay_ms: 1_800_000,
            queue_key: String::from("offline-queue:credits"),
            endpoints: Vec::new(),
        }
    }
}

/// Dashboard fanout settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutSettings {
    pub topic: String,
    pub last_update_key: String,
    pub redelivery_delays_ms: Vec<u64>,
}

impl Default for FanoutSettings {
    fn default() -> Self {
        Self {
            topic: String::from("dashboard-sync"),
            last_update_key: String::from("dashboard:last-update"),
            redelivery_delays_ms: vec![2_000, 5_000],
        }
    }
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

#[cfg(feature = "supervisor")]
impl Settings {
    /// A supervisor config builder with these settings applied. Listeners
    /// can still be added before `build`.
    pub fn supervisor_config(&self) -> crate::supervisor::SupervisorConfigBuilder {
        use crate::supervisor::{ConnectionDescriptor, SupervisorConfig};

        let s = &self.supervisor;
        let mut descriptor = ConnectionDescriptor::new(s.url.clone());
        if let Some(label) = &s.label {
            descriptor = descriptor.with_label(label.clone());
        }
        SupervisorConfig::builder()
            .name(self.component_name("supervisor"))
            .descriptor(descriptor)
            .health_check_interval(ms(s.health_check_interval_ms))
            .ping_timeout(ms(s.ping_timeout_ms))
            .connect_timeout(ms(s.connect_timeout_ms))
            .max_reconnect_attempts(s.max_reconnect_attempts)
            .reconnect_interval(ms(s.reconnect_interval_ms))
            .reconnect_multiplier(s.reconnect_multiplier)
            .max_reconnect_delay(ms(s.max_reconnect_delay_ms))
            .reconnect_jitter(ms(s.reconnect_jitter_ms))
            .retry_base_delay(ms(s.retry_base_delay_ms))
            .retry_jitter(ms(s.retry_jitter_ms))
    }
}

#[cfg(feature = "cache")]
impl Settings {
    /// A cache config builder with these settings applied.
    pub fn cache_config(&self) -> crate::cache::CacheConfigBuilder {
        crate::cache::CacheConfig::builder()
            .name(self.component_name("cache"))
            .default_ttl(ms(self.cache.default_ttl_ms))
    }
}

#[cfg(feature = "fanout")]
impl Settings {
    /// A fanout config builder with these settings applied.
    pub fn fanout_config(&self) -> crate::fanout::FanoutConfigBuilder {
        crate::fanout::FanoutConfig::builder()
            .name(self.component_name("fanout"))
            .topic(self.fanout.topic.clone())
            .last_update_key(self.fanout.last_update_key.clone())
            .redelivery_delays(self.fanout.redelivery_delays_ms.iter().copied().map(ms))
    }
}

#[cfg(feature = "executor")]
impl Settings {
    /// An executor config builder with these settings applied.
    pub fn executor_config(&self) -> crate::executor::ExecutorConfigBuilder {
        let e = &self.executor;
        crate::executor::ExecutorConfig::builder()
            .name(self.component_name("executor"))
            .endpoint_timeout(ms(e.endpoint_timeout_ms))
            .direct_retries(e.direct_retries)
            .client_simulation(e.client_simulation)
            .max_sync_attempts(e.max_sync_attempts)
            .sync_interval(ms(e.sync_interval_ms))
            .max_replay_delay(ms(e.max_replay_delay_ms))
    }

    /// The configured endpoints, in order.
    pub fn endpoints(&self) -> Vec<crate::executor::NetworkEndpoint> {
        self.executor
            .endpoints
            .iter()
            .map(|endpoint| {
                let mut network = crate::executor::NetworkEndpoint::new(
                    endpoint.name.clone(),
                    endpoint.url.clone(),
                );
                if let Some(timeout) = endpoint.timeout_ms {
                    network = network.timeout(ms(timeout));
                }
                network
            })
            .collect()
    }
}
