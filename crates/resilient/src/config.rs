//! Configuration for client resilience behavior.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::ResilientClient`] instance.
///
/// One config applies to one named external service; different services get
/// their own client (and therefore their own breaker and pacing state).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Minimum spacing between dispatched calls in milliseconds.
    pub min_interval_ms: u64,
    /// Maximum number of retry attempts after the initial call.
    pub max_retries: u32,
    /// Base delay between retries in milliseconds.
    pub retry_delay_ms: u64,
    /// Whether retry delays grow exponentially (`retry_delay * 2^attempt`).
    pub exponential_backoff: bool,
    /// Whether to add up to 25% jitter to retry delays.
    pub use_jitter: bool,
    /// HTTP statuses that are worth retrying.
    pub retryable_statuses: Vec<u16>,
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Cooldown before an open circuit lets a probe through, in milliseconds.
    pub reset_timeout_ms: u64,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 100,
            max_retries: 3,
            retry_delay_ms: 1000,
            exponential_backoff: true,
            use_jitter: false,
            retryable_statuses: vec![408, 429, 500, 502, 503, 504],
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl ClientConfig {
    /// Check whether a status code is in the retryable set.
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Calculate the delay to wait after a failed attempt.
    ///
    /// `attempt` is zero-based: the delay after the first failed attempt is
    /// `retry_delay * 2^0`, then `retry_delay * 2^1`, and so on when
    /// exponential backoff is enabled; a constant `retry_delay` otherwise.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = if self.exponential_backoff {
            self.retry_delay_ms.saturating_mul(1u64 << attempt.min(20))
        } else {
            self.retry_delay_ms
        };

        let delay_ms = if self.use_jitter {
            base + (base as f64 * 0.25 * rand::random::<f64>()) as u64
        } else {
            base
        };

        Duration::from_millis(delay_ms)
    }

    /// Minimum spacing between dispatched calls.
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    /// Cooldown before an open circuit half-opens.
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
