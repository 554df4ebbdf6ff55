//! Error types for the resilient client.

use thiserror::Error;

/// Errors surfaced by [`crate::ResilientClient::request`].
///
/// The taxonomy deliberately keeps "the service is down" (circuit open)
/// apart from "this call failed" (status / retry exhaustion) so callers can
/// react differently to each.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The circuit breaker is open; no network call was made.
    #[error("circuit open for service '{service}', retry after {retry_after_secs}s")]
    CircuitOpen {
        service: String,
        retry_after_secs: u64,
    },

    /// All retry attempts against a live but erroring service were consumed.
    #[error("retries exhausted after {attempts} attempts for {method} {path}: {last_error}")]
    RetryExhausted {
        attempts: u32,
        method: String,
        path: String,
        /// Status of the last failed attempt, if it got a response at all.
        last_status: Option<u16>,
        last_error: String,
    },

    /// The service answered with a non-retryable error status.
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Network-level failure (DNS, connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("invalid response payload: {0}")]
    Payload(String),
}

impl ClientError {
    /// Whether this error is a circuit-open fast fail.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Whether this error means retries were exhausted against a live service.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RetryExhausted { last_status, .. } => *last_status,
            _ => None,
        }
    }
}
