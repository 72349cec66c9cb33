//! Consecutive-failure circuit breaker shared between the LLM client and the
//! quality tracker.
//!
//! State machine: `failure_threshold` consecutive failures open the circuit.
//! Once `reset_timeout` has elapsed since the last failure, the next
//! [`CircuitBreaker::is_open`] check half-opens it: the circuit closes and the
//! counter resets so one trial call may proceed; a failure on that call
//! re-opens it immediately.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    open: bool,
}

/// Thread-safe circuit breaker for LLM calls.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    state: Mutex<BreakerState>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Whether calls are currently blocked. Performs the half-open transition
    /// when the reset timeout has elapsed.
    pub fn is_open(&self) -> bool {
        let mut st = self.state.lock().expect("breaker mutex poisoned");
        if !st.open {
            return false;
        }
        if let Some(last) = st.last_failure {
            if last.elapsed() >= self.reset_timeout {
                st.open = false;
                st.consecutive_failures = 0;
                return false;
            }
        }
        true
    }

    /// Record a successful call, closing the circuit.
    pub fn record_success(&self) {
        let mut st = self.state.lock().expect("breaker mutex poisoned");
        st.consecutive_failures = 0;
        st.open = false;
    }

    /// Record a failed call, opening the circuit at the threshold.
    pub fn record_failure(&self) {
        let mut st = self.state.lock().expect("breaker mutex poisoned");
        st.consecutive_failures += 1;
        st.last_failure = Some(Instant::now());
        if st.consecutive_failures >= self.failure_threshold {
            st.open = true;
        }
    }

    /// Current consecutive-failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.state
            .lock()
            .expect("breaker mutex poisoned")
            .consecutive_failures
    }

    /// Manually reset to the closed state.
    pub fn reset(&self) {
        let mut st = self.state.lock().expect("breaker mutex poisoned");
        *st = BreakerState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_and_half_opens_after_timeout() {
        let cb = CircuitBreaker::new(3, Duration::from_millis(20));
        assert!(!cb.is_open());

        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
        cb.record_failure();
        assert!(cb.is_open());

        std::thread::sleep(Duration::from_millis(25));
        // Half-open: the check itself closes the circuit for a trial call.
        assert!(!cb.is_open());
        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_open());
    }

    #[test]
    fn success_resets_counter() {
        let cb = CircuitBreaker::new(2, Duration::from_secs(60));
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert!(!cb.is_open());
    }
}
