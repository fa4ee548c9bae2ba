use super::CreditStrategy;
use crate::credentials::CredentialProvider;
use crate::error::StrategyError;
use crate::request::CreditOperation;
use crate::result::Applied;
use futures::future::BoxFuture;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// An alternate HTTP endpoint able to apply a credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEndpoint {
    /// Name used in diagnostics.
    pub name: String,
    /// URL the credit is POSTed to.
    pub url: String,
    /// Overrides the executor's default endpoint timeout.
    pub timeout: Option<Duration>,
}

impl NetworkEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            timeout: None,
        }
    }

    /// Sets a timeout for this endpoint only.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Acknowledgement fields an endpoint may return. Anything else in the body
/// is ignored, and a body that is not JSON still counts as success.
#[derive(Debug, Default, Deserialize)]
struct Receipt {
    #[serde(default, alias = "transactionId")]
    transaction_id: Option<String>,
    #[serde(default, alias = "newBalance")]
    new_balance: Option<i64>,
}

/// POSTs the credit to one [`NetworkEndpoint`] with a bearer credential.
///
/// The transaction reference travels in the JSON body and in the
/// `Idempotency-Key` header. A 401 or 403 answer invalidates the cached
/// credential so the next endpoint mints a fresh one.
pub struct HttpEndpointStrategy {
    endpoint: NetworkEndpoint,
    timeout: Duration,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpEndpointStrategy {
    /// Creates the strategy. `default_timeout` applies unless the endpoint
    /// carries its own.
    pub fn new(
        endpoint: NetworkEndpoint,
        client: reqwest::Client,
        credentials: Arc<dyn CredentialProvider>,
        default_timeout: Duration,
    ) -> Self {
        let timeout = endpoint.timeout.unwrap_or(default_timeout);
        Self {
            endpoint,
            timeout,
            client,
            credentials,
        }
    }

    /// The endpoint this strategy targets.
    pub fn endpoint(&self) -> &NetworkEndpoint {
        &self.endpoint
    }

    /// The effective request timeout.
    pub fn effective_timeout(&self) -> Duration {
        self.timeout
    }

    fn transport_error(&self, error: reqwest::Error) -> StrategyError {
        if error.is_timeout() {
            StrategyError::Timeout {
                endpoint: self.endpoint.name.clone(),
                timeout: self.timeout,
            }
        } else {
            StrategyError::Transport {
                endpoint: self.endpoint.name.clone(),
                message: error.to_string(),
            }
        }
    }

    async fn post(&self, operation: &CreditOperation) -> Result<Applied, StrategyError> {
        let credential = self.credentials.get_or_mint().await?;
        let request = &operation.request;
        let body = serde_json::json!({
            "customer_id": request.customer_id,
            "business_id": request.business_id,
            "points": request.points,
            "reason": request.reason,
            "transaction_ref": operation.transaction_ref,
            "metadata": request.metadata,
        });

        let response = self
            .client
            .post(&self.endpoint.url)
            .bearer_auth(credential.token())
            .header(IDEMPOTENCY_HEADER, operation.transaction_ref.as_str())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.credentials.invalidate();
        }
        if !status.is_success() {
            return Err(StrategyError::Rejected {
                endpoint: self.endpoint.name.clone(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let receipt: Receipt = serde_json::from_slice(&bytes).unwrap_or_default();
        Ok(Applied {
            transaction_id: receipt.transaction_id,
            new_balance: receipt.new_balance,
            ..Applied::default()
        })
    }
}

impl CreditStrategy for HttpEndpointStrategy {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    fn attempt<'a>(
        &'a self,
        operation: &'a CreditOperation,
    ) -> BoxFuture<'a, Result<Applied, StrategyError>> {
        Box::pin(self.post(operation))
    }
}

impl std::fmt::Debug for HttpEndpointStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEndpointStrategy")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}
