//! The resilient client: pacing, circuit breaking, and retry around a transport.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::breaker::{CircuitBreaker, CircuitState};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{CallResponse, CallSpec, CallTransport, HttpTransport};

/// Resilient outbound-call client for one named external service.
///
/// Owns all per-service state: the pacing gate, the circuit breaker, and the
/// retry policy. Construct one instance per external service at process start
/// and share it; the breaker state of one service never bleeds into another.
pub struct ResilientClient {
    service: String,
    base_url: String,
    config: ClientConfig,
    transport: Arc<dyn CallTransport>,
    breaker: CircuitBreaker,
    /// Time of the last dispatched call. The lock is held across the pacing
    /// sleep on purpose: concurrent callers queue, which is what serializes
    /// dispatch per service instance.
    last_dispatch: Mutex<Option<Instant>>,
}

impl ResilientClient {
    /// Create a client with the production HTTP transport.
    pub fn new(
        service: impl Into<String>,
        base_url: impl Into<String>,
        config: ClientConfig,
    ) -> Self {
        let transport = Arc::new(HttpTransport::new(config.request_timeout()));
        Self::with_transport(service, base_url, config, transport)
    }

    /// Create a client with a custom transport.
    pub fn with_transport(
        service: impl Into<String>,
        base_url: impl Into<String>,
        config: ClientConfig,
        transport: Arc<dyn CallTransport>,
    ) -> Self {
        let breaker = CircuitBreaker::new(config.failure_threshold, config.reset_timeout());
        Self {
            service: service.into(),
            base_url: base_url.into(),
            config,
            transport,
            breaker,
            last_dispatch: Mutex::new(None),
        }
    }

    /// The service name this client is bound to.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Current circuit breaker state.
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Current consecutive failure count.
    pub fn failure_count(&self) -> u32 {
        self.breaker.failure_count()
    }

    /// Manually reset the circuit breaker.
    pub fn reset(&self) {
        self.breaker.reset();
    }

    /// Execute a call with pacing, circuit breaking, and retry.
    ///
    /// A call rejected by an open breaker fails fast with
    /// [`ClientError::CircuitOpen`] and never reaches the transport; a call
    /// that consumes every retry against a live but erroring service fails
    /// with [`ClientError::RetryExhausted`].
    pub async fn request(&self, spec: CallSpec) -> Result<CallResponse, ClientError> {
        let mut attempt: u32 = 0;

        loop {
            self.pace().await;

            if let Err(remaining) = self.breaker.check_allowed() {
                let retry_after_secs = remaining.as_secs().max(1);
                warn!(
                    service = %self.service,
                    method = %spec.method,
                    path = %spec.path,
                    retry_after_secs,
                    "circuit open, rejecting call"
                );
                return Err(ClientError::CircuitOpen {
                    service: self.service.clone(),
                    retry_after_secs,
                });
            }

            debug!(
                service = %self.service,
                method = %spec.method,
                path = %spec.path,
                attempt,
                "dispatching outbound call"
            );

            match self.transport.execute(&self.base_url, &spec).await {
                Ok(response) if response.status.is_success() => {
                    self.breaker.record_success();
                    debug!(
                        service = %self.service,
                        method = %spec.method,
                        path = %spec.path,
                        status = response.status.as_u16(),
                        "outbound call succeeded"
                    );
                    return Ok(response);
                }
                Ok(response) => {
                    self.breaker.record_failure();
                    let status = response.status.as_u16();

                    if self.config.is_retryable(status) {
                        if attempt < self.config.max_retries {
                            let delay = self.config.delay_for_attempt(attempt);
                            warn!(
                                service = %self.service,
                                method = %spec.method,
                                path = %spec.path,
                                status,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                "retryable status, backing off"
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            continue;
                        }

                        warn!(
                            service = %self.service,
                            method = %spec.method,
                            path = %spec.path,
                            status,
                            attempts = attempt + 1,
                            "retries exhausted"
                        );
                        return Err(ClientError::RetryExhausted {
                            attempts: attempt + 1,
                            method: spec.method.to_string(),
                            path: spec.path.clone(),
                            last_status: Some(status),
                            last_error: format!("status {status}"),
                        });
                    }

                    warn!(
                        service = %self.service,
                        method = %spec.method,
                        path = %spec.path,
                        status,
                        "non-retryable error status"
                    );
                    return Err(ClientError::Status {
                        status,
                        body: response.body_text(),
                    });
                }
                Err(error) => {
                    self.breaker.record_failure();

                    if attempt < self.config.max_retries {
                        let delay = self.config.delay_for_attempt(attempt);
                        warn!(
                            service = %self.service,
                            method = %spec.method,
                            path = %spec.path,
                            %error,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "transport error, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    warn!(
                        service = %self.service,
                        method = %spec.method,
                        path = %spec.path,
                        %error,
                        attempts = attempt + 1,
                        "retries exhausted on transport error"
                    );
                    return Err(ClientError::RetryExhausted {
                        attempts: attempt + 1,
                        method: spec.method.to_string(),
                        path: spec.path.clone(),
                        last_status: None,
                        last_error: error.to_string(),
                    });
                }
            }
        }
    }

    /// Wait until the per-service minimum call spacing has elapsed.
    async fn pace(&self) {
        let min_interval = self.config.min_interval();
        let mut last = self.last_dispatch.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < min_interval {
                tokio::time::sleep(min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}
