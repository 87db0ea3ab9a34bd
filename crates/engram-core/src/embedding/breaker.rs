//! Circuit breaker guarding the embedding provider.
//!
//! Consecutive failures open the circuit; while open, lookups skip the
//! provider entirely and fail fast. After the cooldown elapses a single
//! probe request is allowed through (half-open).

use std::time::{Duration, Instant};

/// Circuit breaker state.
#[derive(Debug, Clone)]
pub enum CircuitState {
    /// Normal operation. Tracks consecutive failures toward threshold.
    Closed {
        consecutive_failures: u32,
    },
    /// Provider is disabled. Will probe after `wait_duration` elapses.
    Open {
        opened_at: Instant,
        wait_duration: Duration,
    },
    /// Probing: one request allowed to test if the provider recovered.
    HalfOpen,
}

/// Failure tracking for the embedding provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    /// Number of consecutive failures before opening the circuit.
    failure_threshold: u32,
    /// How long to wait in Open state before probing.
    open_duration: Duration,
    /// Last error message, kept for logging.
    last_error: Option<String>,
    total_calls: u64,
    total_failures: u64,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, open_duration: Duration) -> Self {
        Self {
            state: CircuitState::Closed {
                consecutive_failures: 0,
            },
            failure_threshold,
            open_duration,
            last_error: None,
            total_calls: 0,
            total_failures: 0,
        }
    }

    /// Check whether a provider call is currently allowed.
    ///
    /// Transitions Open -> HalfOpen when the wait duration has elapsed,
    /// so the next caller becomes the probe.
    pub fn can_execute(&mut self) -> bool {
        match &self.state {
            CircuitState::Closed { .. } => true,
            CircuitState::Open {
                opened_at,
                wait_duration,
            } => {
                if opened_at.elapsed() >= *wait_duration {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    /// Record a successful provider call.
    pub fn record_success(&mut self) {
        self.total_calls += 1;
        // Any success fully closes the circuit and resets the count.
        self.state = CircuitState::Closed {
            consecutive_failures: 0,
        };
    }

    /// Record a failed provider call.
    pub fn record_failure(&mut self, error: &str) {
        self.total_calls += 1;
        self.total_failures += 1;
        self.last_error = Some(error.to_string());

        match &self.state {
            CircuitState::Closed {
                consecutive_failures,
            } => {
                let new_count = consecutive_failures + 1;
                if new_count >= self.failure_threshold {
                    self.state = CircuitState::Open {
                        opened_at: Instant::now(),
                        wait_duration: self.open_duration,
                    };
                } else {
                    self.state = CircuitState::Closed {
                        consecutive_failures: new_count,
                    };
                }
            }
            CircuitState::HalfOpen => {
                // Probe failed, reopen the circuit
                self.state = CircuitState::Open {
                    opened_at: Instant::now(),
                    wait_duration: self.open_duration,
                };
            }
            CircuitState::Open { .. } => {
                // Already open, no state change
            }
        }
    }

    pub fn state(&self) -> &CircuitState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(3, Duration::from_secs(30))
    }

    #[test]
    fn test_starts_closed_and_available() {
        let mut b = breaker();
        assert!(b.can_execute());
        assert!(matches!(
            b.state(),
            CircuitState::Closed {
                consecutive_failures: 0
            }
        ));
    }

    #[test]
    fn test_circuit_opens_after_threshold_failures() {
        let mut b = breaker();

        b.record_failure("timeout");
        b.record_failure("timeout");
        assert!(b.can_execute()); // 2 failures, threshold is 3

        b.record_failure("timeout");
        assert!(!b.can_execute()); // 3 failures, circuit opens
        assert!(matches!(b.state(), CircuitState::Open { .. }));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut b = breaker();
        b.record_failure("timeout");
        b.record_failure("timeout");
        b.record_success();

        assert!(matches!(
            b.state(),
            CircuitState::Closed {
                consecutive_failures: 0
            }
        ));
    }

    #[test]
    fn test_open_transitions_to_half_open_after_wait() {
        let mut b = CircuitBreaker::new(1, Duration::from_millis(0));
        b.record_failure("down");
        // Zero wait: the very next check becomes the probe.
        assert!(b.can_execute());
        assert!(matches!(b.state(), CircuitState::HalfOpen));
    }

    #[test]
    fn test_failed_probe_reopens_circuit() {
        let mut b = CircuitBreaker::new(1, Duration::from_millis(0));
        b.record_failure("down");
        assert!(b.can_execute()); // half-open probe
        b.record_failure("still down");
        assert!(matches!(b.state(), CircuitState::Open { .. }));
    }

    #[test]
    fn test_successful_probe_closes_circuit() {
        let mut b = CircuitBreaker::new(1, Duration::from_millis(0));
        b.record_failure("down");
        assert!(b.can_execute());
        b.record_success();
        assert!(matches!(
            b.state(),
            CircuitState::Closed {
                consecutive_failures: 0
            }
        ));
        assert_eq!(b.total_failures(), 1);
    }
}
