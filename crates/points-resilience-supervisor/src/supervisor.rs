use crate::client::{StoreClient, StoreConnector, StoreError};
use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::events::SupervisorEvent;
use crate::state::{ConnectionState, SupervisorState};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::fmt;
use std::future::Future;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Owns the single logical handle to the backing data store.
///
/// The supervisor tracks the connection lifecycle, pings the store on a fixed
/// period while connected and reconnects with capped exponential backoff when
/// a ping fails. Operations run through [`execute_with_retry`] get the
/// current client handle and are retried with their own backoff.
///
/// Handles are cheap to clone and share one connection.
///
/// [`execute_with_retry`]: ConnectionSupervisor::execute_with_retry
pub struct ConnectionSupervisor<C: StoreConnector> {
    shared: Arc<Shared<C>>,
}

impl<C: StoreConnector> Clone for ConnectionSupervisor<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<C: StoreConnector> {
    connector: C,
    config: SupervisorConfig,
    client: RwLock<Option<Arc<C::Client>>>,
    state: SupervisorState,
    state_tx: watch::Sender<ConnectionState>,
    tasks: Mutex<Tasks>,
}

#[derive(Default)]
struct Tasks {
    health: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
}

impl Tasks {
    fn abort_all(&mut self) {
        if let Some(handle) = self.health.take() {
            handle.abort();
        }
        if let Some(handle) = self.reconnect.take() {
            handle.abort();
        }
    }
}

impl Drop for Tasks {
    fn drop(&mut self) {
        self.abort_all();
    }
}

impl<C: StoreConnector> ConnectionSupervisor<C> {
    /// Creates a supervisor in the `Disconnected` state. Nothing connects
    /// until [`initialize`](Self::initialize) is called.
    pub fn new(connector: C, config: SupervisorConfig) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "supervisor_state_transitions_total",
                "Total number of connection state transitions"
            );
            describe_counter!(
                "supervisor_reconnect_attempts_total",
                "Total number of scheduled reconnection attempts"
            );
            describe_gauge!(
                "supervisor_connected",
                "1 while the supervised connection is healthy, 0 otherwise"
            );
        });

        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            shared: Arc::new(Shared {
                connector,
                config,
                client: RwLock::new(None),
                state: SupervisorState::new(),
                state_tx,
                tasks: Mutex::new(Tasks::default()),
            }),
        }
    }

    /// Establishes the client handle and issues one liveness ping.
    ///
    /// On success the supervisor is `Connected` and the periodic health check
    /// is running. On failure it is left reconnecting in the background and
    /// the ping error is returned.
    pub async fn initialize(&self) -> Result<(), SupervisorError> {
        let shared = &self.shared;
        if shared.state.is_shut_down() {
            return Err(SupervisorError::ShutDown);
        }

        shared.transition(ConnectionState::Connecting);

        match shared.connect_and_ping().await {
            Ok(client) => {
                shared.install_client(client);
                shared.state.reset_attempts();
                shared.transition(ConnectionState::Connected);
                shared.ensure_health_loop();
                Ok(())
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    supervisor = %shared.config.name,
                    store = shared.config.descriptor.display_name(),
                    %error,
                    "initial connection failed"
                );
                shared.clear_client();
                shared.transition(ConnectionState::Disconnected);
                shared.start_reconnect();
                Err(SupervisorError::ConnectFailed(error))
            }
        }
    }

    /// Runs `op` against the current client, retrying failures.
    ///
    /// `max_retries` bounds the total number of attempts (at least one runs).
    /// The delay before retry `n` (0-indexed) is the configured retry backoff,
    /// `500ms × 2^n + jitter(0..500ms)` by default. Every attempt runs
    /// against the installed client. When the last attempt fails with a
    /// connectivity error the connection is pinged once, and a failed ping
    /// starts reconnection unless the initial connection is still in
    /// progress. When no client is installed the attempt fails with
    /// [`StoreError::NotConnected`].
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        mut op: F,
        max_retries: usize,
    ) -> Result<T, SupervisorError>
    where
        F: FnMut(Arc<C::Client>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let shared = &self.shared;
        let max_attempts = max_retries.max(1);
        let mut attempt = 0;

        loop {
            if shared.state.is_shut_down() {
                return Err(SupervisorError::ShutDown);
            }
            attempt += 1;

            let result = match shared.current_client() {
                Some(client) => op(client).await,
                None => Err(StoreError::NotConnected),
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if attempt >= max_attempts {
                if error.is_connectivity() {
                    shared.confirm_connection().await;
                }

                shared.emit(SupervisorEvent::RetriesExhausted {
                    name: shared.config.name.clone(),
                    timestamp: Instant::now(),
                    attempts: attempt,
                });

                #[cfg(feature = "tracing")]
                tracing::warn!(
                    supervisor = %shared.config.name,
                    attempts = attempt,
                    %error,
                    "operation failed after exhausting retries"
                );

                return Err(SupervisorError::RetriesExhausted {
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = shared.config.retry_delay(attempt - 1);
            shared.emit(SupervisorEvent::Retry {
                name: shared.config.name.clone(),
                timestamp: Instant::now(),
                attempt,
                delay,
            });

            #[cfg(feature = "tracing")]
            tracing::debug!(
                supervisor = %shared.config.name,
                attempt,
                ?delay,
                %error,
                "retrying operation"
            );

            tokio::time::sleep(delay).await;
        }
    }

    /// Starts reconnection unless one is already in flight.
    ///
    /// Returns `true` if this call started a reconnection and `false` if one
    /// was already running (or the supervisor is shut down).
    pub fn force_reconnect(&self) -> bool {
        self.shared.start_reconnect()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state.state()
    }

    /// Failed reconnection attempts since the last successful ping.
    pub fn attempts(&self) -> u32 {
        self.shared.state.attempts()
    }

    /// Returns true while a reconnection task is running.
    pub fn is_reconnecting(&self) -> bool {
        self.shared.state.reconnect_in_flight()
    }

    /// The current client handle, if one is installed.
    pub fn client(&self) -> Option<Arc<C::Client>> {
        self.shared.current_client()
    }

    /// Subscribes to state changes. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// The supervisor configuration.
    pub fn config(&self) -> &SupervisorConfig {
        &self.shared.config
    }

    /// Stops the health check and any reconnection, drops the client and
    /// settles in `Disconnected`. Later calls fail with
    /// [`SupervisorError::ShutDown`].
    pub fn shutdown(&self) {
        let shared = &self.shared;
        shared.state.mark_shut_down();
        shared.lock_tasks().abort_all();
        shared.state.end_reconnect();
        shared.clear_client();
        shared.transition(ConnectionState::Disconnected);

        #[cfg(feature = "tracing")]
        tracing::info!(supervisor = %shared.config.name, "connection supervisor shut down");
    }
}

impl<C: StoreConnector> fmt::Debug for ConnectionSupervisor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("name", &self.shared.config.name)
            .field("state", &self.shared.state)
            .finish()
    }
}

impl<C: StoreConnector> Shared<C> {
    fn emit(&self, event: SupervisorEvent) {
        self.config.event_listeners.emit(&event);
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_client(&self) -> Option<Arc<C::Client>> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install_client(&self, client: C::Client) {
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(client));
    }

    fn clear_client(&self) {
        self.client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn transition(&self, to: ConnectionState) {
        let from = self.state.swap(to);
        if from == to {
            return;
        }

        self.state_tx.send_replace(to);
        self.emit(SupervisorEvent::StateTransition {
            name: self.config.name.clone(),
            timestamp: Instant::now(),
            from,
            to,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(
            supervisor = %self.config.name,
            from = from.as_str(),
            to = to.as_str(),
            "connection state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "supervisor_state_transitions_total",
                "supervisor" => self.config.name.clone(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);

            gauge!("supervisor_connected", "supervisor" => self.config.name.clone()).set(
                if to == ConnectionState::Connected {
                    1.0
                } else {
                    0.0
                },
            );
        }
    }

    async fn connect_and_ping(&self) -> Result<C::Client, StoreError> {
        let connect_timeout = self.config.connect_timeout;
        let client = tokio::time::timeout(
            connect_timeout,
            self.connector.connect(&self.config.descriptor),
        )
        .await
        .map_err(|_| StoreError::Timeout(connect_timeout))??;

        self.ping(&client).await?;
        Ok(client)
    }

    /// A healthy ping returns exactly one row within the ping timeout.
    async fn ping(&self, client: &C::Client) -> Result<(), StoreError> {
        let ping_timeout = self.config.ping_timeout;
        match tokio::time::timeout(ping_timeout, client.ping()).await {
            Err(_) => Err(StoreError::Timeout(ping_timeout)),
            Ok(Ok(1)) => Ok(()),
            Ok(Ok(rows)) => Err(StoreError::PingRejected { rows }),
            Ok(Err(error)) => Err(error),
        }
    }

    fn ensure_health_loop(self: &Arc<Self>) {
        let mut tasks = self.lock_tasks();
        if tasks
            .health
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
        {
            return;
        }

        let weak = Arc::downgrade(self);
        let period = self.config.health_check_interval;
        tasks.health = Some(tokio::spawn(health_loop(weak, period)));
    }

    async fn health_check(self: &Arc<Self>) {
        let outcome = match self.current_client() {
            Some(client) => self.ping(&client).await,
            None => Err(StoreError::NotConnected),
        };

        // The state may have moved on while the ping was in flight.
        if self.state.state() != ConnectionState::Connected {
            return;
        }

        if let Err(error) = outcome {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                supervisor = %self.config.name,
                %error,
                "liveness ping failed"
            );

            self.emit(SupervisorEvent::HealthCheckFailed {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                error: error.to_string(),
            });
            self.start_reconnect();
        }
    }

    /// Pings the installed client after an operation gave up on a
    /// connectivity error, reconnecting if the ping fails too.
    async fn confirm_connection(self: &Arc<Self>) {
        if self.state.state() == ConnectionState::Connecting || self.state.reconnect_in_flight() {
            return;
        }

        let outcome = match self.current_client() {
            Some(client) => self.ping(&client).await,
            None => Err(StoreError::NotConnected),
        };

        if let Err(error) = outcome {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                supervisor = %self.config.name,
                %error,
                "connection check after failed operation failed"
            );

            self.emit(SupervisorEvent::HealthCheckFailed {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                error: error.to_string(),
            });
            self.start_reconnect();
        }
    }

    fn start_reconnect(self: &Arc<Self>) -> bool {
        if self.state.is_shut_down() {
            return false;
        }
        if !self.state.try_begin_reconnect() {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                supervisor = %self.config.name,
                "reconnection already in flight"
            );
            return false;
        }

        self.state.reset_attempts();
        self.clear_client();
        self.transition(ConnectionState::Reconnecting);

        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move { shared.reconnect_loop().await });
        self.lock_tasks().reconnect = Some(handle);
        true
    }

    async fn reconnect_loop(self: Arc<Self>) {
        loop {
            if self.state.is_shut_down() {
                break;
            }

            let attempts = self.state.attempts();
            if attempts >= self.config.max_reconnect_attempts {
                self.clear_client();
                self.transition(ConnectionState::Disconnected);
                self.emit(SupervisorEvent::ReconnectFailed {
                    name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    attempts,
                });

                #[cfg(feature = "tracing")]
                tracing::error!(
                    supervisor = %self.config.name,
                    store = self.config.descriptor.display_name(),
                    attempts,
                    "reconnection failed, giving up"
                );
                break;
            }

            let delay = self.config.reconnect_delay(attempts as usize);
            self.emit(SupervisorEvent::ReconnectScheduled {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                attempt: attempts + 1,
                delay,
            });

            #[cfg(feature = "tracing")]
            tracing::debug!(
                supervisor = %self.config.name,
                attempt = attempts + 1,
                ?delay,
                "reconnection scheduled"
            );

            #[cfg(feature = "metrics")]
            counter!(
                "supervisor_reconnect_attempts_total",
                "supervisor" => self.config.name.clone()
            )
            .increment(1);

            tokio::time::sleep(delay).await;
            if self.state.is_shut_down() {
                break;
            }

            match self.connect_and_ping().await {
                Ok(client) => {
                    self.install_client(client);
                    self.state.reset_attempts();
                    self.transition(ConnectionState::Connected);
                    self.emit(SupervisorEvent::Reconnected {
                        name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempts + 1,
                    });
                    self.ensure_health_loop();
                    break;
                }
                Err(_error) => {
                    let _failed = self.state.increment_attempts();

                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        supervisor = %self.config.name,
                        attempt = _failed,
                        error = %_error,
                        "reconnection attempt failed"
                    );
                }
            }
        }

        self.state.end_reconnect();
    }
}

async fn health_loop<C: StoreConnector>(weak: Weak<Shared<C>>, period: std::time::Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(shared) = weak.upgrade() else {
            break;
        };
        if shared.state.is_shut_down() {
            break;
        }
        if shared.state.state() == ConnectionState::Connected {
            shared.health_check().await;
        }
    }
}
