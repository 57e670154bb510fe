//! Exponential backoff retry executor.
//!
//! Wraps breaker-guarded delivery attempts in an exponential backoff loop.
//! A retry is attempted for *any* error — transport failure, non-2xx status,
//! or an open breaker — so that the backoff can wait out a breaker's open
//! interval. Retrying stops on success, when the attempt or elapsed-time
//! budget runs out, or when the caller cancels.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

// ============================================================================
// RetryPolicy
// ============================================================================

/// Retry policy configuration for exponential backoff.
///
/// The elapsed-time budget is derived rather than configured:
/// `max_elapsed_time = initial_interval × max_attempts`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_interval: Duration,

    /// Exponential growth factor (typically 2.0).
    pub multiplier: f64,

    /// Maximum number of delivery attempts.
    pub max_attempts: u32,

    /// Whether to add jitter to delays (recommended in production).
    pub use_jitter: bool,

    /// Jitter range as a fraction of the delay (default ±25%).
    pub jitter_percent: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(2),
            multiplier: 2.0,
            max_attempts: 5,
            use_jitter: true,
            jitter_percent: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(initial_interval: Duration, multiplier: f64, max_attempts: u32) -> Self {
        Self {
            initial_interval,
            multiplier,
            max_attempts,
            use_jitter: true,
            jitter_percent: 0.25,
        }
    }

    /// Disable jitter, making delays deterministic.
    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Total elapsed-time budget across all attempts and delays.
    pub fn max_elapsed_time(&self) -> Duration {
        self.initial_interval * self.max_attempts
    }

    /// Delay before the retry following attempt number `attempt` (0-based).
    ///
    /// Uses the exponential backoff formula
    /// `initial_interval * multiplier^attempt`, with jitter applied when
    /// enabled.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_interval.as_secs_f64() * self.multiplier.powi(attempt as i32);

        let delayed = if self.use_jitter {
            add_jitter(base, self.jitter_percent)
        } else {
            base
        };

        Duration::from_secs_f64(delayed)
    }
}

/// Apply random variation in `[delay * (1 - jitter), delay * (1 + jitter)]`.
fn add_jitter(delay_secs: f64, jitter_percent: f64) -> f64 {
    let mut rng = rand::thread_rng();
    let jitter_range = delay_secs * jitter_percent;
    let jitter = rng.gen_range(-jitter_range..=jitter_range);
    (delay_secs + jitter).max(0.0)
}

// ============================================================================
// Retry Executor
// ============================================================================

/// Terminal outcome of an exhausted or interrupted retry loop.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The attempt and elapsed-time budgets ran out.
    #[error("retries exhausted: {last_error}")]
    Exhausted {
        #[source]
        last_error: E,
    },

    /// The caller cancelled while an attempt or delay was pending.
    #[error("retry cancelled")]
    Cancelled,
}

/// Execute an operation with exponential backoff.
///
/// Each invocation of `operation` is one attempt. Any error triggers a
/// retry after the policy's delay for that attempt, until the attempt count
/// reaches `max_attempts`, the elapsed time reaches `max_elapsed_time`, or
/// `cancel` fires. Cancellation is observed both during an in-flight attempt
/// (the attempt future is dropped) and during backoff sleeps.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started = tokio::time::Instant::now();
    let max_elapsed = policy.max_elapsed_time();
    let mut attempt: u32 = 0;

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = operation() => result,
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        attempt += 1;
        if attempt >= policy.max_attempts || started.elapsed() >= max_elapsed {
            return Err(RetryError::Exhausted { last_error: error });
        }

        let delay = policy.delay_for_attempt(attempt - 1);
        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
