use crate::config::ExecutorConfig;
use crate::credentials::{CredentialProvider, MintingCredentials};
use crate::error::{CredentialError, ExecutionError};
use crate::events::ExecutorEvent;
use crate::ledger::PointsLedger;
use crate::queue::OfflineQueue;
use crate::request::{CreditOperation, CreditRequest};
use crate::result::{Applied, Attempt, Identifiers, OperationResult};
use crate::strategy::{
    ClientSimulationStrategy, CreditStrategy, DirectWriteStrategy, HttpEndpointStrategy,
    NetworkEndpoint, OfflineQueueStrategy,
};
use crate::sync::OfflineSync;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use points_resilience_fanout::{DashboardSync, SyncEvent};
use points_resilience_supervisor::{ConnectionSupervisor, StoreConnector};
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use tokio::sync::Notify;
use tokio::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

type DirectFactory = Box<dyn FnOnce(&ExecutorConfig) -> Arc<dyn CreditStrategy> + Send>;

/// Applies credits through an ordered chain of strategies, ending in a
/// durable offline queue.
///
/// The chain is fixed at construction:
/// direct write, each network endpoint in order, custom strategies, client
/// simulation (when enabled), offline queue. Strategies run one at a time;
/// the first success ends the invocation and is announced to the fanout.
///
/// Every strategy receives the same transaction reference, generated once
/// per [`execute`](Self::execute) call unless the request carries one.
#[derive(Clone)]
pub struct GuaranteedExecutor {
    inner: Arc<ExecutorInner>,
}

pub(crate) struct ExecutorInner {
    pub(crate) config: ExecutorConfig,
    pub(crate) strategies: Vec<Arc<dyn CreditStrategy>>,
    pub(crate) queue: OfflineQueue,
    pub(crate) wake: Arc<Notify>,
    pub(crate) fanout: Option<DashboardSync>,
    /// When each failed queued operation may be replayed again, by id.
    pub(crate) replay_schedule: std::sync::Mutex<HashMap<String, Instant>>,
}

impl GuaranteedExecutor {
    /// Starts building an executor whose last resort is `queue`.
    pub fn builder(queue: OfflineQueue) -> ExecutorBuilder {
        ExecutorBuilder::new(queue)
    }

    /// Applies `request` or durably queues it.
    ///
    /// Returns [`ExecutionError::Exhausted`] only when the offline queue
    /// itself failed.
    pub async fn execute(&self, request: CreditRequest) -> Result<OperationResult, ExecutionError> {
        let inner = &self.inner;
        let operation = CreditOperation::new(request);
        let mut diagnostics = Vec::with_capacity(inner.strategies.len());

        for strategy in &inner.strategies {
            let start = Instant::now();
            let outcome = strategy.attempt(&operation).await;
            let elapsed = start.elapsed();

            match outcome {
                Ok(applied) => {
                    diagnostics.push(Attempt {
                        strategy: strategy.name().to_string(),
                        error: None,
                        elapsed,
                    });
                    inner.record_success(strategy.name(), elapsed);

                    let result = OperationResult {
                        success: true,
                        offline: applied.offline,
                        provisional: applied.provisional,
                        strategy_used: strategy.name().to_string(),
                        identifiers: Identifiers {
                            transaction_ref: operation.transaction_ref.clone(),
                            transaction_id: applied.transaction_id.clone(),
                            new_balance: applied.new_balance,
                            pending_operation_id: applied.pending_operation_id.clone(),
                        },
                        diagnostics,
                    };

                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        executor = %inner.config.name,
                        strategy = strategy.name(),
                        transaction_ref = %operation.transaction_ref,
                        offline = result.offline,
                        provisional = result.provisional,
                        "credit accepted"
                    );

                    inner.announce(&operation, strategy.name(), &applied).await;
                    return Ok(result);
                }
                Err(error) => {
                    let error = error.to_string();

                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        executor = %inner.config.name,
                        strategy = strategy.name(),
                        transaction_ref = %operation.transaction_ref,
                        %error,
                        "credit strategy failed"
                    );

                    inner.record_failure(strategy.name(), &error, elapsed);
                    diagnostics.push(Attempt {
                        strategy: strategy.name().to_string(),
                        error: Some(error),
                        elapsed,
                    });
                }
            }
        }

        inner.config.event_listeners.emit(&ExecutorEvent::Exhausted {
            name: inner.config.name.clone(),
            timestamp: Instant::now(),
            attempts: diagnostics.len(),
        });

        #[cfg(feature = "tracing")]
        tracing::error!(
            executor = %inner.config.name,
            transaction_ref = %operation.transaction_ref,
            attempts = diagnostics.len(),
            "credit could not be applied or queued"
        );

        Err(ExecutionError::Exhausted { diagnostics })
    }

    /// The background sync for this executor's queue.
    pub fn offline_sync(&self) -> OfflineSync {
        OfflineSync::new(Arc::clone(&self.inner))
    }

    /// Names of the strategies in the order they are tried.
    pub fn strategy_names(&self) -> Vec<String> {
        self.inner
            .strategies
            .iter()
            .map(|strategy| strategy.name().to_string())
            .collect()
    }

    /// The offline queue.
    pub fn queue(&self) -> &OfflineQueue {
        &self.inner.queue
    }

    /// Notified whenever an operation is queued.
    pub fn wake_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.inner.wake)
    }

    /// The executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for GuaranteedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuaranteedExecutor")
            .field("config", &self.inner.config)
            .field("strategies", &self.strategy_names())
            .field("queue", &self.inner.queue)
            .finish()
    }
}

impl ExecutorInner {
    pub(crate) fn record_success(&self, strategy: &str, elapsed: std::time::Duration) {
        self.config
            .event_listeners
            .emit(&ExecutorEvent::StrategySucceeded {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                strategy: strategy.to_string(),
                elapsed,
            });

        #[cfg(feature = "metrics")]
        counter!(
            "credit_attempts_total",
            "executor" => self.config.name.clone(),
            "strategy" => strategy.to_string(),
            "result" => "success"
        )
        .increment(1);
    }

    pub(crate) fn record_failure(&self, strategy: &str, error: &str, elapsed: std::time::Duration) {
        self.config.event_listeners.emit(&ExecutorEvent::StrategyFailed {
            name: self.config.name.clone(),
            timestamp: Instant::now(),
            strategy: strategy.to_string(),
            error: error.to_string(),
            elapsed,
        });

        #[cfg(feature = "metrics")]
        counter!(
            "credit_attempts_total",
            "executor" => self.config.name.clone(),
            "strategy" => strategy.to_string(),
            "result" => "failure"
        )
        .increment(1);
    }

    /// Sends the completion event to the fanout, if one is attached.
    pub(crate) async fn announce(
        &self,
        operation: &CreditOperation,
        strategy: &str,
        applied: &Applied,
    ) {
        let Some(fanout) = &self.fanout else {
            return;
        };

        let request = &operation.request;
        let status = if applied.provisional {
            "provisional"
        } else if applied.offline {
            "queued"
        } else {
            "applied"
        };

        let mut event = SyncEvent::new(
            request.customer_id.clone(),
            self.config.operation_type.clone(),
        )
        .identifier("business_id", &request.business_id)
        .identifier("points", request.points)
        .identifier("transaction_ref", &operation.transaction_ref)
        .identifier("strategy", strategy)
        .identifier("status", status);
        if let Some(id) = &applied.transaction_id {
            event = event.identifier("transaction_id", id);
        }
        if let Some(balance) = applied.new_balance {
            event = event.identifier("new_balance", balance);
        }
        if let Some(id) = &applied.pending_operation_id {
            event = event.identifier("pending_operation_id", id);
        }

        fanout.notify(event).await;
    }
}

/// Builder for [`GuaranteedExecutor`].
pub struct ExecutorBuilder {
    queue: OfflineQueue,
    config: ExecutorConfig,
    direct: Option<DirectFactory>,
    endpoints: Vec<NetworkEndpoint>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    http_client: Option<reqwest::Client>,
    custom: Vec<Arc<dyn CreditStrategy>>,
    fanout: Option<DashboardSync>,
}

impl ExecutorBuilder {
    fn new(queue: OfflineQueue) -> Self {
        Self {
            queue,
            config: ExecutorConfig::default(),
            direct: None,
            endpoints: Vec::new(),
            credentials: None,
            http_client: None,
            custom: Vec::new(),
            fanout: None,
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Writes through `supervisor` first.
    pub fn direct<C>(mut self, supervisor: ConnectionSupervisor<C>) -> Self
    where
        C: StoreConnector,
        C::Client: PointsLedger,
    {
        self.direct = Some(Box::new(move |config: &ExecutorConfig| {
            Arc::new(DirectWriteStrategy::new(supervisor).retries(config.direct_retries))
                as Arc<dyn CreditStrategy>
        }));
        self
    }

    /// Appends an alternate endpoint.
    pub fn endpoint(mut self, endpoint: NetworkEndpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Appends several alternate endpoints.
    pub fn endpoints(mut self, endpoints: impl IntoIterator<Item = NetworkEndpoint>) -> Self {
        self.endpoints.extend(endpoints);
        self
    }

    /// Sets the credential provider shared by all endpoints. Without one,
    /// every endpoint attempt fails with [`CredentialError::NoIdentity`].
    pub fn credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the HTTP client used for endpoints.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Appends a custom strategy, tried after the endpoints.
    pub fn strategy(mut self, strategy: Arc<dyn CreditStrategy>) -> Self {
        self.custom.push(strategy);
        self
    }

    /// Announces successes on `fanout`.
    pub fn fanout(mut self, fanout: DashboardSync) -> Self {
        self.fanout = Some(fanout);
        self
    }

    /// Builds the executor.
    pub fn build(self) -> GuaranteedExecutor {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "credit_attempts_total",
                "Total number of credit strategy attempts by strategy and result"
            );
            describe_counter!(
                "offline_sync_total",
                "Total number of queued credits replayed by result"
            );
        });

        let config = self.config;
        let wake = Arc::new(Notify::new());
        let mut strategies: Vec<Arc<dyn CreditStrategy>> = Vec::new();

        if let Some(direct) = self.direct {
            strategies.push(direct(&config));
        }

        if !self.endpoints.is_empty() {
            let client = self.http_client.unwrap_or_default();
            let credentials = self.credentials.unwrap_or_else(|| {
                Arc::new(MintingCredentials::new(|| async {
                    Err(CredentialError::NoIdentity)
                }))
            });
            for endpoint in self.endpoints {
                strategies.push(Arc::new(HttpEndpointStrategy::new(
                    endpoint,
                    client.clone(),
                    Arc::clone(&credentials),
                    config.endpoint_timeout,
                )));
            }
        }

        strategies.extend(self.custom);

        if config.client_simulation {
            strategies.push(Arc::new(ClientSimulationStrategy::new(
                self.queue.clone(),
                Arc::clone(&wake),
            )));
        }
        strategies.push(Arc::new(OfflineQueueStrategy::new(
            self.queue.clone(),
            Arc::clone(&wake),
        )));

        GuaranteedExecutor {
            inner: Arc::new(ExecutorInner {
                config,
                strategies,
                queue: self.queue,
                wake,
                fanout: self.fanout,
                replay_schedule: std::sync::Mutex::new(HashMap::new()),
            }),
        }
    }
}

impl std::fmt::Debug for ExecutorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorBuilder")
            .field("config", &self.config)
            .field("direct", &self.direct.is_some())
            .field("endpoints", &self.endpoints)
            .field("custom", &self.custom.len())
            .finish()
    }
}
