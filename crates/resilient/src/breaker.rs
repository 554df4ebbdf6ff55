//! Circuit breaker guarding a single external service.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed (normal operation).
    Closed,
    /// Circuit is open (failing, rejecting calls).
    Open,
    /// Circuit is half-open (one probe allowed through).
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker for protecting against cascading failures.
///
/// Closed → Open after `failure_threshold` consecutive failures. While open,
/// calls are rejected without touching the network until `reset_timeout` has
/// elapsed since the last failure, at which point the breaker half-opens and
/// lets a single probe through: the probe's success closes the circuit, its
/// failure reopens it.
pub struct CircuitBreaker {
    /// Current state.
    state: RwLock<CircuitState>,
    /// Consecutive failure count.
    failure_count: AtomicU32,
    /// Failure threshold to open the circuit.
    failure_threshold: u32,
    /// Time of the most recent failure.
    last_failure: RwLock<Option<Instant>>,
    /// Cooldown before an open circuit half-opens.
    reset_timeout: Duration,
}

impl CircuitBreaker {
    /// Create a new circuit breaker.
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            failure_threshold,
            last_failure: RwLock::new(None),
            reset_timeout,
        }
    }

    /// Get the current state, applying the open → half-open transition first.
    pub fn state(&self) -> CircuitState {
        self.check_state_transition();
        *self.state.read()
    }

    /// Current consecutive failure count.
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    /// Check whether a call may proceed.
    ///
    /// Returns the remaining cooldown when the circuit is open.
    pub fn check_allowed(&self) -> Result<(), Duration> {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let remaining = (*self.last_failure.read())
                    .map(|at| self.reset_timeout.saturating_sub(at.elapsed()))
                    .unwrap_or(self.reset_timeout);
                Err(remaining)
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let state = *self.state.read();

        match state {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                *self.state.write() = CircuitState::Closed;
                self.failure_count.store(0, Ordering::SeqCst);
                info!("circuit breaker closed after successful probe");
            }
            CircuitState::Open => {
                // A success can't be observed while open; calls are rejected.
            }
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        *self.last_failure.write() = Some(Instant::now());
        let state = *self.state.read();

        match state {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.failure_threshold {
                    *self.state.write() = CircuitState::Open;
                    warn!("circuit breaker opened after {failures} consecutive failures");
                }
            }
            CircuitState::HalfOpen => {
                self.failure_count.fetch_add(1, Ordering::SeqCst);
                *self.state.write() = CircuitState::Open;
                warn!("circuit breaker reopened after failed probe");
            }
            CircuitState::Open => {}
        }
    }

    /// Reset the circuit breaker to the closed state.
    pub fn reset(&self) {
        *self.state.write() = CircuitState::Closed;
        self.failure_count.store(0, Ordering::SeqCst);
        *self.last_failure.write() = None;
        debug!("circuit breaker reset to closed state");
    }

    /// Apply the open → half-open transition once the cooldown elapses.
    fn check_state_transition(&self) {
        let state = *self.state.read();

        if state == CircuitState::Open
            && let Some(at) = *self.last_failure.read()
            && at.elapsed() >= self.reset_timeout
        {
            *self.state.write() = CircuitState::HalfOpen;
            debug!("circuit breaker transitioned to half-open state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(threshold, Duration::from_millis(timeout_ms))
    }

    #[test]
    fn test_starts_closed() {
        let b = breaker(3, 1000);
        assert_eq!(b.state(), CircuitState::Closed);
        assert!(b.check_allowed().is_ok());
    }

    #[test]
    fn test_opens_at_threshold() {
        let b = breaker(3, 1000);

        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), CircuitState::Closed);

        b.record_failure();
        assert_eq!(b.state(), CircuitState::Open);

        let remaining = b.check_allowed().unwrap_err();
        assert!(remaining <= Duration::from_millis(1000));
    }

    #[test]
    fn test_success_resets_failure_count_while_closed() {
        let b = breaker(3, 1000);

        b.record_failure();
        b.record_failure();
        b.record_success();
        assert_eq!(b.failure_count(), 0);

        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_opens_after_cooldown() {
        let b = breaker(1, 30);

        b.record_failure();
        assert_eq!(b.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert!(b.check_allowed().is_ok());
    }

    #[test]
    fn test_probe_success_closes() {
        let b = breaker(1, 30);
        b.record_failure();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(b.state(), CircuitState::HalfOpen);

        b.record_success();
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.failure_count(), 0);
    }

    #[test]
    fn test_probe_failure_reopens() {
        let b = breaker(1, 30);
        b.record_failure();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(b.state(), CircuitState::HalfOpen);

        b.record_failure();
        assert_eq!(b.state(), CircuitState::Open);
        assert!(b.check_allowed().is_err());
    }

    #[test]
    fn test_reset() {
        let b = breaker(2, 60_000);
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), CircuitState::Open);

        b.reset();
        assert_eq!(b.state(), CircuitState::Closed);
        assert!(b.check_allowed().is_ok());
    }
}
