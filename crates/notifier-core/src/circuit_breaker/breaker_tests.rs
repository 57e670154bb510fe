//! Tests for the circuit breaker state machine.
//!
//! Timer-driven transitions use paused tokio time so the open interval can
//! be crossed deterministically.

use super::*;
use crate::circuit_breaker::{BreakerError, CircuitBreakerConfig, CircuitState};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Helper Functions
// ============================================================================

/// Breaker with a tight configuration for tests.
fn create_breaker(minimum_calls: u32, permitted_probes: u32) -> CircuitBreaker {
    let config = CircuitBreakerConfig {
        failure_rate_threshold: 0.5,
        minimum_calls,
        measurement_interval: Duration::from_secs(10),
        wait_duration_in_open_state: Duration::from_secs(10),
        permitted_half_open_calls: permitted_probes,
        ..CircuitBreakerConfig::default()
    };
    CircuitBreaker::new("https://h/down", config)
}

async fn succeed(breaker: &CircuitBreaker) -> Result<&'static str, BreakerError<&'static str>> {
    breaker.call(|| async { Ok::<_, &str>("ok") }).await
}

async fn fail(breaker: &CircuitBreaker) -> Result<&'static str, BreakerError<&'static str>> {
    breaker.call(|| async { Err::<&str, _>("boom") }).await
}

// ============================================================================
// Closed State Tests
// ============================================================================

mod closed_state_tests {
    use super::*;

    #[test]
    fn test_initial_state_is_closed() {
        let breaker = create_breaker(5, 3);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_successful_calls_pass_through() {
        let breaker = create_breaker(5, 3);
        assert_eq!(succeed(&breaker).await.unwrap(), "ok");
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_operation_errors_are_wrapped() {
        let breaker = create_breaker(5, 3);
        match fail(&breaker).await {
            Err(BreakerError::Operation(e)) => assert_eq!(e, "boom"),
            other => panic!("expected operation error, got {other:?}"),
        }
    }

    /// Failures below the minimum call count never trip the breaker, no
    /// matter how bad the ratio is.
    #[tokio::test]
    async fn test_stays_closed_below_minimum_calls() {
        let breaker = create_breaker(5, 3);
        for _ in 0..4 {
            let _ = fail(&breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_trips_open_at_failure_rate_threshold() {
        let breaker = create_breaker(5, 3);
        for _ in 0..5 {
            let _ = fail(&breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    /// A failure ratio under the threshold keeps the breaker closed even
    /// past the minimum call count.
    #[tokio::test]
    async fn test_stays_closed_under_failure_rate_threshold() {
        let breaker = create_breaker(5, 3);
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        for _ in 0..3 {
            let _ = succeed(&breaker).await;
        }
        // 2 failures out of 5 calls is a 0.4 ratio.
        assert_eq!(breaker.state(), CircuitState::Closed);

        let _ = fail(&breaker).await;
        // 3 failures out of 6 calls reaches 0.5.
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    /// Counters are scoped to the measurement interval: old failures roll
    /// off once the window expires.
    #[tokio::test(start_paused = true)]
    async fn test_measurement_window_resets_counts() {
        let breaker = create_breaker(2, 3);
        let _ = fail(&breaker).await;

        tokio::time::advance(Duration::from_secs(11)).await;

        let _ = fail(&breaker).await;
        // Only one call in the fresh window; below minimum_calls.
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}

// ============================================================================
// Open State Tests
// ============================================================================

mod open_state_tests {
    use super::*;

    async fn tripped_breaker() -> CircuitBreaker {
        let breaker = create_breaker(2, 1);
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);
        breaker
    }

    /// An open breaker rejects without invoking the operation.
    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_fails_fast() {
        let breaker = tripped_breaker().await;

        let invoked = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&invoked);
        let result = breaker
            .call(|| async move {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, &str>("ok")
            })
            .await;

        assert!(matches!(result, Err(BreakerError::CircuitOpen)));
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stays_open_within_wait_duration() {
        let breaker = tripped_breaker().await;

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(matches!(
            succeed(&breaker).await,
            Err(BreakerError::CircuitOpen)
        ));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    /// After the open interval elapses the next call runs as a half-open
    /// probe.
    #[tokio::test(start_paused = true)]
    async fn test_transitions_to_half_open_after_wait_duration() {
        let breaker = tripped_breaker().await;

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(succeed(&breaker).await.unwrap(), "ok");
        // permitted_half_open_calls is 1, so one success closes it.
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}

// ============================================================================
// Half-Open State Tests
// ============================================================================

mod half_open_state_tests {
    use super::*;

    async fn half_open_breaker(permitted_probes: u32) -> CircuitBreaker {
        let breaker = create_breaker(2, permitted_probes);
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(10)).await;
        breaker
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_reopens() {
        let breaker = half_open_breaker(3).await;

        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        // The open timer restarted on the probe failure.
        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(matches!(
            succeed(&breaker).await,
            Err(BreakerError::CircuitOpen)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_permitted_probes_succeeding_closes() {
        let breaker = half_open_breaker(2).await;

        assert_eq!(succeed(&breaker).await.unwrap(), "ok");
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        assert_eq!(succeed(&breaker).await.unwrap(), "ok");
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    /// Concurrent probes beyond the permitted budget are rejected.
    #[tokio::test(start_paused = true)]
    async fn test_probe_budget_limits_concurrency() {
        let breaker = Arc::new(half_open_breaker(1).await);

        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let probe_breaker = Arc::clone(&breaker);
        let probe = tokio::spawn(async move {
            probe_breaker
                .call(|| async move {
                    gate.await.map_err(|_| "gate dropped")?;
                    Ok::<_, &str>("ok")
                })
                .await
        });

        // Let the probe enter the breaker and park on the gate.
        tokio::task::yield_now().await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        let rejected = succeed(&breaker).await;
        assert!(matches!(rejected, Err(BreakerError::ProbeLimitExceeded)));

        release.send(()).unwrap();
        assert_eq!(probe.await.unwrap().unwrap(), "ok");
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    /// A closed-from-recovery breaker starts with fresh counters.
    #[tokio::test(start_paused = true)]
    async fn test_recovered_breaker_counts_from_zero() {
        let breaker = half_open_breaker(1).await;
        assert_eq!(succeed(&breaker).await.unwrap(), "ok");
        assert_eq!(breaker.state(), CircuitState::Closed);

        // One failure in the fresh window is below minimum_calls.
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
