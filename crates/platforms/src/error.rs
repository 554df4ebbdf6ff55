//! Adapter error types.

use thiserror::Error;

use crate::platform::Platform;

/// Errors surfaced by platform adapters.
///
/// A session lookup that finds nothing is NOT an error; it is `Ok(None)` from
/// [`crate::PlatformAdapter::get_session`]. Errors here mean the operation
/// itself could not be carried out.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Credential refresh failed; a human has to re-authorize the integration.
    #[error("reauthorization required for {platform}: {reason}")]
    ReauthorizationRequired { platform: Platform, reason: String },

    /// The outbound call failed (retry exhaustion, circuit open, bad status).
    #[error(transparent)]
    Client(#[from] resilient_client::ClientError),

    /// The platform answered with a payload we cannot interpret.
    #[error("unexpected {platform} payload: {detail}")]
    UnexpectedPayload { platform: Platform, detail: String },
}

impl AdapterError {
    pub fn reauthorization(platform: Platform, reason: impl Into<String>) -> Self {
        Self::ReauthorizationRequired {
            platform,
            reason: reason.into(),
        }
    }

    pub fn payload(platform: Platform, detail: impl Into<String>) -> Self {
        Self::UnexpectedPayload {
            platform,
            detail: detail.into(),
        }
    }

    /// Whether this error means the stored credential is no longer usable.
    pub fn is_reauthorization_required(&self) -> bool {
        matches!(self, Self::ReauthorizationRequired { .. })
    }
}
