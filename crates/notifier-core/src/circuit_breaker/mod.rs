//! Per-destination circuit breaking for webhook delivery.
//!
//! Every destination URL gets its own breaker with the standard three-state
//! machine:
//!
//! - **Closed**: calls pass through; successes and failures are counted over
//!   a rolling measurement interval. When the interval has seen at least
//!   `minimum_calls` calls and the failure ratio reaches
//!   `failure_rate_threshold`, the breaker opens.
//! - **Open**: calls fail fast with [`BreakerError::CircuitOpen`]. After
//!   `wait_duration_in_open_state`, the next call transitions to half-open.
//! - **Half-Open**: at most `permitted_half_open_calls` concurrent probes;
//!   any failure reopens the breaker (resetting the timer), and all
//!   permitted probes succeeding closes it.
//!
//! Breakers are created lazily by the [`BreakerTable`] on first use of a URL
//! and live for the process lifetime, apart from opportunistic eviction of
//! long-idle entries.

use std::time::Duration;
use thiserror::Error;

mod breaker;
mod table;

pub use breaker::CircuitBreaker;
pub use table::BreakerTable;

// ============================================================================
// Circuit State
// ============================================================================

/// Current state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; calls pass through and failures are counted.
    Closed,

    /// Fast-fail mode; calls are rejected until the open interval elapses.
    Open,

    /// Recovery testing; a limited number of concurrent probes are allowed.
    HalfOpen,
}

impl CircuitState {
    /// Check whether requests are allowed in this state.
    pub fn allows_requests(&self) -> bool {
        matches!(self, Self::Closed | Self::HalfOpen)
    }

    /// Short name for structured log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for circuit breaker behavior.
///
/// # Default Configuration
///
/// - Failure rate threshold: 0.50
/// - Minimum calls before tripping: 5
/// - Measurement interval: 10 seconds
/// - Wait in open state: 10 seconds
/// - Permitted half-open probes: 3
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failure ratio (0.0 to 1.0) at which a closed breaker trips.
    pub failure_rate_threshold: f64,

    /// Minimum calls in the measurement interval before the ratio is
    /// evaluated.
    pub minimum_calls: u32,

    /// Length of the rolling measurement interval for closed-state counts.
    pub measurement_interval: Duration,

    /// Time an open breaker rejects calls before allowing probes.
    pub wait_duration_in_open_state: Duration,

    /// Maximum concurrent probe calls in half-open state; this many
    /// consecutive successful probes close the breaker.
    pub permitted_half_open_calls: u32,

    /// Slow-call ratio threshold (accepted for configuration compatibility;
    /// not part of the trip decision).
    pub slow_call_rate_threshold: f64,

    /// Duration beyond which a call counts as slow (accepted for
    /// configuration compatibility; not part of the trip decision).
    pub slow_call_duration_threshold: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.50,
            minimum_calls: 5,
            measurement_interval: Duration::from_secs(10),
            wait_duration_in_open_state: Duration::from_secs(10),
            permitted_half_open_calls: 3,
            slow_call_rate_threshold: 0.60,
            slow_call_duration_threshold: Duration::from_secs(2),
        }
    }
}

// ============================================================================
// BreakerError
// ============================================================================

/// Error from a breaker-guarded call.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker is open; the call was rejected without executing.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The half-open probe budget is exhausted; the call was rejected.
    #[error("too many concurrent half-open probes")]
    ProbeLimitExceeded,

    /// The guarded operation executed and failed.
    #[error(transparent)]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// Check whether this error came from breaker protection rather than the
    /// operation itself.
    pub fn is_circuit_protection(&self) -> bool {
        matches!(self, Self::CircuitOpen | Self::ProbeLimitExceeded)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
