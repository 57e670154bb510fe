//! Circuit breaker state machine for a single destination URL.
//!
//! State and counters live behind a mutex that is held only for bookkeeping,
//! never across the guarded call. Timing uses [`tokio::time::Instant`] so the
//! open-interval behavior is testable with paused time.

use super::{BreakerError, CircuitBreakerConfig, CircuitState};
use std::future::Future;
use std::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

// ============================================================================
// Internal State
// ============================================================================

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,

    /// Start of the current closed-state measurement interval.
    window_start: Instant,

    /// Calls completed in the current interval.
    calls: u32,

    /// Failed calls in the current interval.
    failures: u32,

    /// Probes currently in flight while half-open.
    probes_in_flight: u32,

    /// Successful probes since entering half-open.
    probe_successes: u32,

    /// When the breaker last opened.
    opened_at: Option<Instant>,

    /// When the breaker was last consulted, for idle eviction.
    last_used: Instant,
}

impl BreakerState {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            state: CircuitState::Closed,
            window_start: now,
            calls: 0,
            failures: 0,
            probes_in_flight: 0,
            probe_successes: 0,
            opened_at: None,
            last_used: now,
        }
    }

    /// Reset interval counts when the measurement window has rolled over.
    fn roll_window(&mut self, interval: std::time::Duration) {
        if self.window_start.elapsed() >= interval {
            self.window_start = Instant::now();
            self.calls = 0;
            self.failures = 0;
        }
    }
}

/// Decision taken while admitting a call.
enum Admission {
    Execute,
    Rejected,
    ProbeLimit,
}

// ============================================================================
// CircuitBreaker
// ============================================================================

/// Breaker for one destination URL.
///
/// Wraps delivery attempts via [`call`](Self::call); rejected calls fail
/// fast without executing the operation. State transitions are logged with
/// the destination for operability.
pub struct CircuitBreaker {
    destination: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new breaker for a destination URL.
    pub fn new(destination: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            destination: destination.into(),
            config,
            state: Mutex::new(BreakerState::new()),
        }
    }

    /// The destination URL this breaker guards.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Current circuit state.
    pub fn state(&self) -> CircuitState {
        self.lock_state().state
    }

    /// When this breaker was last consulted.
    pub(super) fn last_used(&self) -> Instant {
        self.lock_state().last_used
    }

    /// Execute an operation under breaker protection.
    ///
    /// # Behavior
    ///
    /// - **Closed**: execute and record the outcome against the interval
    ///   counters, tripping open when the failure ratio crosses the
    ///   threshold.
    /// - **Open**: reject with [`BreakerError::CircuitOpen`] until the open
    ///   interval elapses, then admit the call as the first half-open probe.
    /// - **Half-Open**: admit up to the configured number of concurrent
    ///   probes; reject the rest with [`BreakerError::ProbeLimitExceeded`].
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.admit() {
            Admission::Execute => {}
            Admission::Rejected => return Err(BreakerError::CircuitOpen),
            Admission::ProbeLimit => return Err(BreakerError::ProbeLimitExceeded),
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                Err(BreakerError::Operation(error))
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        // Bookkeeping never panics while holding the lock; recover from
        // poisoning rather than propagating it into the delivery path.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit or reject a call, handling the open → half-open transition.
    fn admit(&self) -> Admission {
        let mut state = self.lock_state();
        state.last_used = Instant::now();

        match state.state {
            CircuitState::Closed => Admission::Execute,
            CircuitState::Open => {
                let waited_out = state
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.wait_duration_in_open_state)
                    .unwrap_or(true);

                if waited_out {
                    self.transition(&mut state, CircuitState::HalfOpen);
                    state.probes_in_flight = 1;
                    Admission::Execute
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if state.probes_in_flight >= self.config.permitted_half_open_calls {
                    Admission::ProbeLimit
                } else {
                    state.probes_in_flight += 1;
                    Admission::Execute
                }
            }
        }
    }

    fn record_success(&self) {
        let mut state = self.lock_state();
        match state.state {
            CircuitState::Closed => {
                state.roll_window(self.config.measurement_interval);
                state.calls += 1;
            }
            CircuitState::HalfOpen => {
                state.probes_in_flight = state.probes_in_flight.saturating_sub(1);
                state.probe_successes += 1;
                if state.probe_successes >= self.config.permitted_half_open_calls {
                    self.transition(&mut state, CircuitState::Closed);
                }
            }
            CircuitState::Open => {
                // A probe admitted before a concurrent failure reopened the
                // breaker; its success does not rewind the open timer.
                state.probes_in_flight = state.probes_in_flight.saturating_sub(1);
            }
        }
    }

    fn record_failure(&self) {
        let mut state = self.lock_state();
        match state.state {
            CircuitState::Closed => {
                state.roll_window(self.config.measurement_interval);
                state.calls += 1;
                state.failures += 1;

                let ratio = f64::from(state.failures) / f64::from(state.calls);
                if state.calls >= self.config.minimum_calls
                    && ratio >= self.config.failure_rate_threshold
                {
                    warn!(
                        destination = %self.destination,
                        calls = state.calls,
                        failures = state.failures,
                        "failure rate threshold reached"
                    );
                    self.transition(&mut state, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                state.probes_in_flight = state.probes_in_flight.saturating_sub(1);
                self.transition(&mut state, CircuitState::Open);
            }
            CircuitState::Open => {
                state.probes_in_flight = state.probes_in_flight.saturating_sub(1);
            }
        }
    }

    /// Apply a state transition with its entry bookkeeping.
    fn transition(&self, state: &mut BreakerState, to: CircuitState) {
        let from = state.state;
        state.state = to;

        match to {
            CircuitState::Open => {
                state.opened_at = Some(Instant::now());
                state.probe_successes = 0;
            }
            CircuitState::HalfOpen => {
                state.probes_in_flight = 0;
                state.probe_successes = 0;
            }
            CircuitState::Closed => {
                state.window_start = Instant::now();
                state.calls = 0;
                state.failures = 0;
                state.opened_at = None;
                state.probes_in_flight = 0;
                state.probe_successes = 0;
            }
        }

        info!(
            destination = %self.destination,
            from = %from,
            to = %to,
            "circuit breaker state changed"
        );
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
