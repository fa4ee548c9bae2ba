//! Every component wired together.

use crate::cache::{CacheConfig, QueryCache};
use crate::core::KeyValueStore;
use crate::executor::{
    CredentialProvider, CreditRequest, ExecutionError, GuaranteedExecutor, OfflineQueue,
    OperationResult, PointsLedger,
};
use crate::fanout::{DashboardSync, SyncBus};
use crate::settings::Settings;
use crate::supervisor::{ConnectionSupervisor, StoreConnector, SupervisorError};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// Cache tag carried by every entry derived from one customer's data.
pub fn customer_tag(customer_id: &str) -> String {
    format!("customer:{customer_id}")
}

/// The resilience layer of one process.
///
/// Credits go through the [`GuaranteedExecutor`]; each completion event
/// invalidates the cache entries tagged with [`customer_tag`] for the
/// credited customer, so dashboards re-read fresh balances.
pub struct ResilienceStack<C: StoreConnector, V> {
    supervisor: ConnectionSupervisor<C>,
    cache: QueryCache<String, V>,
    fanout: DashboardSync,
    executor: GuaranteedExecutor,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl<C, V> ResilienceStack<C, V>
where
    C: StoreConnector,
    C::Client: PointsLedger,
    V: Clone + Send + 'static,
{
    /// Builds the stack from `settings`. `store` holds the offline queue and
    /// the last-update record.
    pub fn new(connector: C, settings: &Settings, store: Arc<dyn KeyValueStore>) -> Self {
        Self::build(connector, settings, store, None)
    }

    /// Like [`new`](Self::new), with credentials for the network endpoints.
    pub fn with_credentials(
        connector: C,
        settings: &Settings,
        store: Arc<dyn KeyValueStore>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self::build(connector, settings, store, Some(credentials))
    }

    fn build(
        connector: C,
        settings: &Settings,
        store: Arc<dyn KeyValueStore>,
        credentials: Option<Arc<dyn CredentialProvider>>,
    ) -> Self {
        let supervisor = ConnectionSupervisor::new(connector, settings.supervisor_config().build());
        let cache: QueryCache<String, V> = QueryCache::new(settings.cache_config().build());
        let fanout = DashboardSync::with_store(
            settings.fanout_config().build(),
            SyncBus::new(),
            Arc::clone(&store),
        );

        let invalidated = cache.clone();
        fanout.register_callback(move |event| {
            invalidated.invalidate_by_tag(&customer_tag(&event.subject_id));
        });

        let mut builder = GuaranteedExecutor::builder(OfflineQueue::with_key(
            store,
            settings.executor.queue_key.clone(),
        ))
        .config(settings.executor_config().build())
        .direct(supervisor.clone())
        .endpoints(settings.endpoints())
        .fanout(fanout.clone());
        if let Some(credentials) = credentials {
            builder = builder.credentials(credentials);
        }

        Self {
            supervisor,
            cache,
            fanout,
            executor: builder.build(),
            sync_task: Mutex::new(None),
        }
    }

    /// Connects the supervisor and starts the background offline sync.
    ///
    /// A failed initial connection is returned, but the stack stays usable:
    /// the supervisor keeps reconnecting and credits fall back to the other
    /// strategies meanwhile.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let connected = self.supervisor.initialize().await;

        let mut task = self
            .sync_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if task.is_none() {
            *task = Some(self.executor.offline_sync().spawn());
        }
        connected
    }

    /// Credits points through the executor.
    pub async fn credit(&self, request: CreditRequest) -> Result<OperationResult, ExecutionError> {
        self.executor.execute(request).await
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor<C> {
        &self.supervisor
    }

    pub fn cache(&self) -> &QueryCache<String, V> {
        &self.cache
    }

    pub fn fanout(&self) -> &DashboardSync {
        &self.fanout
    }

    pub fn executor(&self) -> &GuaranteedExecutor {
        &self.executor
    }

    /// Stops the background sync, fanout redelivery and the supervisor.
    pub fn shutdown(&self) {
        if let Some(task) = self
            .sync_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        self.fanout.shutdown();
        self.supervisor.shutdown();
    }
}

impl<C: StoreConnector, V> std::fmt::Debug for ResilienceStack<C, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceStack")
            .field("supervisor", &self.supervisor)
            .field("executor", &self.executor)
            .finish()
    }
}
