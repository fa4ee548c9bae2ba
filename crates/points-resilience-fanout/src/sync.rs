use crate::bus::{Subscription, SyncBus};
use crate::config::FanoutConfig;
use crate::error::FanoutError;
use crate::event::{LastUpdate, SyncEvent};
use crate::events::FanoutEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use points_resilience_core::{KeyValueStore, KeyValueStoreExt};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

const CHANNEL_BUS: &str = "bus";
const CHANNEL_LAST_UPDATE: &str = "last_update";
const CHANNEL_CALLBACK: &str = "callback";
const CHANNEL_REDELIVERY: &str = "redelivery";

/// A registered observer callback.
pub type SyncCallback = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Handle returned by [`DashboardSync::register_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// What one [`notify`](DashboardSync::notify) call reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Bus subscribers the event was handed to.
    pub subscribers: usize,
    /// Whether the last-update record was written.
    pub persisted: bool,
    /// Callbacks that returned normally.
    pub callbacks_invoked: usize,
    /// Callbacks that panicked.
    pub callbacks_failed: usize,
    /// Delayed redeliveries scheduled.
    pub redeliveries_scheduled: usize,
}

/// Broadcasts completion events through several independent channels.
///
/// Every [`notify`](Self::notify) delivers to
/// 1. the [`SyncBus`] topic,
/// 2. the persisted last-update record (when a store is attached),
/// 3. every registered callback,
/// 4. the bus and callbacks again after each configured redelivery delay.
///
/// A failing channel is logged and reported; it never stops the others.
/// Observers must treat repeats of the same `event_id` as one event.
#[derive(Clone)]
pub struct DashboardSync {
    inner: Arc<Inner>,
}

struct Inner {
    config: FanoutConfig,
    bus: SyncBus,
    store: Option<Arc<dyn KeyValueStore>>,
    callbacks: RwLock<Vec<(CallbackId, SyncCallback)>>,
    next_callback: AtomicU64,
    redeliveries: Mutex<Vec<JoinHandle<()>>>,
}

impl DashboardSync {
    /// Creates a fanout publishing on `bus` with no persisted record.
    pub fn new(config: FanoutConfig, bus: SyncBus) -> Self {
        Self::build(config, bus, None)
    }

    /// Creates a fanout that also persists a last-update record in `store`.
    pub fn with_store(config: FanoutConfig, bus: SyncBus, store: Arc<dyn KeyValueStore>) -> Self {
        Self::build(config, bus, Some(store))
    }

    fn build(config: FanoutConfig, bus: SyncBus, store: Option<Arc<dyn KeyValueStore>>) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "fanout_deliveries_total",
                "Total number of fanout deliveries by channel and result"
            );
        });

        Self {
            inner: Arc::new(Inner {
                config,
                bus,
                store,
                callbacks: RwLock::new(Vec::new()),
                next_callback: AtomicU64::new(0),
                redeliveries: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Delivers `event` on every channel.
    pub async fn notify(&self, event: SyncEvent) -> DeliveryReport {
        let inner = &self.inner;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            fanout = %inner.config.name,
            event_id = %event.event_id,
            subject = %event.subject_id,
            operation = %event.operation_type,
            "fanning out event"
        );

        let subscribers = inner.publish(&event, CHANNEL_BUS);
        let persisted = inner.persist(&event).await;
        let (callbacks_invoked, callbacks_failed) = inner.invoke_callbacks(&event);
        let redeliveries_scheduled = self.schedule_redelivery(event);

        DeliveryReport {
            subscribers,
            persisted,
            callbacks_invoked,
            callbacks_failed,
            redeliveries_scheduled,
        }
    }

    /// Subscribes to the configured bus topic.
    pub fn subscribe(&self) -> Subscription {
        self.inner.bus.subscribe(&self.inner.config.topic)
    }

    /// Reads the persisted last-update record. `None` when no store is
    /// attached or nothing has been recorded.
    pub async fn last_update(&self) -> Result<Option<LastUpdate>, FanoutError> {
        let Some(store) = &self.inner.store else {
            return Ok(None);
        };
        Ok(store.get_json(&self.inner.config.last_update_key).await?)
    }

    /// Registers a callback invoked on every delivery.
    pub fn register_callback<F>(&self, f: F) -> CallbackId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = CallbackId(self.inner.next_callback.fetch_add(1, Ordering::Relaxed));
        self.inner
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(f)));
        id
    }

    /// Removes a callback. Returns whether it was registered.
    pub fn unregister_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = self
            .inner
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    /// Redeliveries still waiting to fire.
    pub fn pending_redeliveries(&self) -> usize {
        let mut handles = self.inner.lock_redeliveries();
        handles.retain(|handle| !handle.is_finished());
        handles.len()
    }

    /// Cancels pending redeliveries.
    pub fn shutdown(&self) {
        for handle in self.inner.lock_redeliveries().drain(..) {
            handle.abort();
        }
    }

    /// The underlying bus.
    pub fn bus(&self) -> &SyncBus {
        &self.inner.bus
    }

    /// The fanout configuration.
    pub fn config(&self) -> &FanoutConfig {
        &self.inner.config
    }

    fn schedule_redelivery(&self, event: SyncEvent) -> usize {
        let delays = self.inner.config.redelivery_delays.clone();
        if delays.is_empty() {
            return 0;
        }
        let scheduled = delays.len();

        let inner = Arc::clone(&self.inner);
        let start = Instant::now();
        let handle = tokio::spawn(async move {
            for delay in delays {
                tokio::time::sleep_until(start + delay).await;
                inner.publish(&event, CHANNEL_REDELIVERY);
                inner.invoke_callbacks(&event);
            }
        });

        let mut handles = self.inner.lock_redeliveries();
        handles.retain(|handle| !handle.is_finished());
        handles.push(handle);
        scheduled
    }
}

impl Inner {
    fn lock_redeliveries(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.redeliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: &SyncEvent, channel: &'static str) -> usize {
        let subscribers = self.bus.publish(&self.config.topic, event.clone());
        self.delivered(channel, event);
        subscribers
    }

    async fn persist(&self, event: &SyncEvent) -> bool {
        let Some(store) = &self.store else {
            return false;
        };

        let record = LastUpdate {
            event: event.clone(),
            recorded_at: chrono::Utc::now(),
        };
        match store.set_json(&self.config.last_update_key, &record).await {
            Ok(()) => {
                self.delivered(CHANNEL_LAST_UPDATE, event);
                true
            }
            Err(error) => {
                self.failed(CHANNEL_LAST_UPDATE, event, error.to_string());
                false
            }
        }
    }

    /// Returns `(returned, panicked)`.
    fn invoke_callbacks(&self, event: &SyncEvent) -> (usize, usize) {
        let callbacks: Vec<SyncCallback> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        let mut invoked = 0;
        let mut failed = 0;
        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => invoked += 1,
                Err(_) => {
                    failed += 1;
                    self.failed(CHANNEL_CALLBACK, event, "callback panicked".to_string());
                }
            }
        }
        if invoked > 0 {
            self.delivered(CHANNEL_CALLBACK, event);
        }
        (invoked, failed)
    }

    fn delivered(&self, channel: &'static str, event: &SyncEvent) {
        self.config.event_listeners.emit(&FanoutEvent::Delivered {
            name: self.config.name.clone(),
            timestamp: Instant::now(),
            channel,
            event_id: event.event_id,
        });

        #[cfg(feature = "metrics")]
        counter!(
            "fanout_deliveries_total",
            "fanout" => self.config.name.clone(),
            "channel" => channel,
            "result" => "ok"
        )
        .increment(1);
    }

    fn failed(&self, channel: &'static str, event: &SyncEvent, error: String) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            fanout = %self.config.name,
            channel,
            event_id = %event.event_id,
            %error,
            "fanout channel failed"
        );

        #[cfg(feature = "metrics")]
        counter!(
            "fanout_deliveries_total",
            "fanout" => self.config.name.clone(),
            "channel" => channel,
            "result" => "error"
        )
        .increment(1);

        self.config.event_listeners.emit(&FanoutEvent::DeliveryFailed {
            name: self.config.name.clone(),
            timestamp: Instant::now(),
            channel,
            event_id: event.event_id,
            error,
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for handle in self
            .redeliveries
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for DashboardSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardSync")
            .field("config", &self.inner.config)
            .field("persistent", &self.inner.store.is_some())
            .finish()
    }
}
