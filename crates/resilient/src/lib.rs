//! Resilient outbound-call primitive.
//!
//! Wraps HTTP calls against one named external service with call pacing,
//! retry/backoff, and a circuit breaker. Construct one [`ResilientClient`]
//! per external service; it owns all per-service state and knows nothing
//! about the callers' domain.

mod breaker;
mod client;
mod config;
mod error;
mod transport;

pub use breaker::{CircuitBreaker, CircuitState};
pub use client::ResilientClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use transport::{CallResponse, CallSpec, CallTransport, HttpTransport};
