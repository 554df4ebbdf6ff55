//! Credential caching for adapters.
//!
//! Adapters never hold a raw token themselves; they ask their [`TokenCache`]
//! for a bearer value before each call. The cache refreshes through its
//! [`CredentialSource`] once the stored credential is within the expiry
//! buffer of going stale.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::AdapterError;
use crate::platform::Platform;

/// Default slack before expiry at which a credential counts as stale.
const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 60;

/// A credential issued for one platform integration.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Bearer token value.
    pub token: String,
    /// Expiry, if the issuer communicated one. `None` means long-lived.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Whether the credential is still usable `buffer` ahead of now.
    fn is_fresh(&self, buffer: Duration) -> bool {
        match self.expires_at {
            Some(at) => Utc::now() + buffer < at,
            None => true,
        }
    }
}

/// Issues credentials for a platform integration.
///
/// The concrete OAuth exchange lives behind this trait; the monitoring core
/// only needs "give me a valid credential or fail".
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn issue(&self) -> Result<Credential, AdapterError>;
}

/// Source backed by a long-lived token handed over in configuration.
pub struct StaticCredentialSource {
    token: String,
}

impl StaticCredentialSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn issue(&self) -> Result<Credential, AdapterError> {
        Ok(Credential {
            token: self.token.clone(),
            expires_at: None,
        })
    }
}

/// Per-adapter credential cache with transparent refresh.
pub struct TokenCache {
    platform: Platform,
    source: Box<dyn CredentialSource>,
    cached: Mutex<Option<Credential>>,
    expiry_buffer: Duration,
}

impl TokenCache {
    pub fn new(platform: Platform, source: Box<dyn CredentialSource>) -> Self {
        Self {
            platform,
            source,
            cached: Mutex::new(None),
            expiry_buffer: Duration::seconds(DEFAULT_EXPIRY_BUFFER_SECS),
        }
    }

    /// Override the staleness buffer.
    pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
        self.expiry_buffer = buffer;
        self
    }

    /// A bearer token valid for at least the expiry buffer.
    ///
    /// Refreshes through the source when the cached credential is stale; a
    /// failed refresh surfaces [`AdapterError::ReauthorizationRequired`] and
    /// leaves the cache empty.
    pub async fn bearer(&self) -> Result<String, AdapterError> {
        let mut cached = self.cached.lock().await;

        if let Some(credential) = cached.as_ref()
            && credential.is_fresh(self.expiry_buffer)
        {
            return Ok(credential.token.clone());
        }

        debug!(platform = %self.platform, "credential stale or absent, refreshing");
        match self.source.issue().await {
            Ok(credential) => {
                let token = credential.token.clone();
                *cached = Some(credential);
                Ok(token)
            }
            Err(error) => {
                *cached = None;
                warn!(platform = %self.platform, %error, "credential refresh failed");
                Err(AdapterError::reauthorization(
                    self.platform,
                    error.to_string(),
                ))
            }
        }
    }

    /// Drop the cached credential so the next call refreshes.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}
