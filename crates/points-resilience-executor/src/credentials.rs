//! Get-or-mint credentials for network endpoints.

use crate::error::CredentialError;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// A bearer credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: Option<Instant>,
}

impl Credential {
    /// A credential that never expires.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// A credential valid for `lifetime` from now.
    pub fn expiring_in(token: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(Instant::now() + lifetime),
        }
    }

    /// The bearer token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// When the credential stops being accepted, if it expires.
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    fn usable(&self, margin: Duration) -> bool {
        self.expires_at
            .map_or(true, |expires_at| Instant::now() + margin < expires_at)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Supplies credentials to the network strategy.
pub trait CredentialProvider: Send + Sync {
    /// Returns the cached credential, minting a new one if there is none or
    /// it is about to expire.
    fn get_or_mint(&self) -> BoxFuture<'_, Result<Credential, CredentialError>>;

    /// Drops the cached credential after an endpoint refused it.
    fn invalidate(&self);
}

/// A fixed credential, for endpoints using a long-lived key.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credential: Credential,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credential: Credential::new(token),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn get_or_mint(&self) -> BoxFuture<'_, Result<Credential, CredentialError>> {
        let credential = self.credential.clone();
        Box::pin(async move { Ok(credential) })
    }

    fn invalidate(&self) {}
}

/// The function that exchanges the cached identity for a new credential.
pub type MintFn =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Credential, CredentialError>> + Send + Sync>;

/// Caches a credential and mints a replacement through a user function.
///
/// Concurrent callers finding the cache empty wait for a single mint.
pub struct MintingCredentials {
    mint: MintFn,
    cached: Mutex<Option<Credential>>,
    minting: tokio::sync::Mutex<()>,
    refresh_margin: Duration,
}

impl MintingCredentials {
    /// Creates a provider that calls `mint` whenever a credential is needed.
    pub fn new<F, Fut>(mint: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Credential, CredentialError>> + Send + 'static,
    {
        Self {
            mint: Arc::new(move || {
                Box::pin(mint()) as BoxFuture<'static, Result<Credential, CredentialError>>
            }),
            cached: Mutex::new(None),
            minting: tokio::sync::Mutex::new(()),
            refresh_margin: DEFAULT_REFRESH_MARGIN,
        }
    }

    /// Re-mints credentials expiring within `margin` (default 30s).
    pub fn refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Option<Credential>> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cached(&self) -> Option<Credential> {
        self.lock()
            .as_ref()
            .filter(|credential| credential.usable(self.refresh_margin))
            .cloned()
    }
}

impl CredentialProvider for MintingCredentials {
    fn get_or_mint(&self) -> BoxFuture<'_, Result<Credential, CredentialError>> {
        Box::pin(async move {
            if let Some(credential) = self.cached() {
                return Ok(credential);
            }

            let _minting = self.minting.lock().await;
            if let Some(credential) = self.cached() {
                return Ok(credential);
            }

            #[cfg(feature = "tracing")]
            tracing::debug!("minting endpoint credential");

            let credential = (self.mint)().await?;
            *self.lock() = Some(credential.clone());
            Ok(credential)
        })
    }

    fn invalidate(&self) {
        self.lock().take();
    }
}

impl fmt::Debug for MintingCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MintingCredentials")
            .field("cached", &self.lock().is_some())
            .field("refresh_margin", &self.refresh_margin)
            .finish()
    }
}
