//! Tests for circuit breaker configuration, states, and the breaker table.

use super::*;
use std::sync::Arc;

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_default_config_matches_reference_values() {
    let config = CircuitBreakerConfig::default();
    assert_eq!(config.failure_rate_threshold, 0.50);
    assert_eq!(config.minimum_calls, 5);
    assert_eq!(config.measurement_interval, Duration::from_secs(10));
    assert_eq!(config.wait_duration_in_open_state, Duration::from_secs(10));
    assert_eq!(config.permitted_half_open_calls, 3);
}

// ============================================================================
// Circuit State Tests
// ============================================================================

#[test]
fn test_allows_requests() {
    assert!(CircuitState::Closed.allows_requests());
    assert!(CircuitState::HalfOpen.allows_requests());
    assert!(!CircuitState::Open.allows_requests());
}

#[test]
fn test_state_display_names() {
    assert_eq!(CircuitState::Closed.to_string(), "closed");
    assert_eq!(CircuitState::Open.to_string(), "open");
    assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
}

// ============================================================================
// Error Classification Tests
// ============================================================================

#[test]
fn test_protection_errors_are_distinguished_from_operation_errors() {
    assert!(BreakerError::<&str>::CircuitOpen.is_circuit_protection());
    assert!(BreakerError::<&str>::ProbeLimitExceeded.is_circuit_protection());
    assert!(!BreakerError::Operation("boom").is_circuit_protection());
}

// ============================================================================
// Breaker Table Tests
// ============================================================================

mod breaker_table_tests {
    use super::*;

    #[test]
    fn test_creates_entries_lazily() {
        let table = BreakerTable::new(CircuitBreakerConfig::default());
        assert!(table.is_empty());

        let breaker = table.breaker_for("https://h/a");
        assert_eq!(table.len(), 1);
        assert_eq!(breaker.destination(), "https://h/a");
    }

    /// The same URL always resolves to the same entry.
    #[test]
    fn test_same_url_shares_one_breaker() {
        let table = BreakerTable::new(CircuitBreakerConfig::default());
        let first = table.breaker_for("https://h/a");
        let second = table.breaker_for("https://h/a");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_distinct_urls_get_distinct_breakers() {
        let table = BreakerTable::new(CircuitBreakerConfig::default());
        let a = table.breaker_for("https://h/a");
        let b = table.breaker_for("https://h/b");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 2);
    }

    /// Entries idle past the eviction threshold are dropped when a new
    /// destination is first seen.
    #[tokio::test(start_paused = true)]
    async fn test_idle_entries_are_evicted_on_insert() {
        let table = BreakerTable::new(CircuitBreakerConfig::default());
        table.breaker_for("https://h/stale");

        tokio::time::advance(Duration::from_secs(11 * 60)).await;

        table.breaker_for("https://h/fresh");
        assert_eq!(table.len(), 1);
    }

    /// Recently consulted entries survive eviction sweeps.
    #[tokio::test(start_paused = true)]
    async fn test_active_entries_survive_eviction() {
        let table = BreakerTable::new(CircuitBreakerConfig::default());
        let active = table.breaker_for("https://h/active");

        tokio::time::advance(Duration::from_secs(9 * 60)).await;
        let _ = active.call(|| async { Ok::<_, &str>("ok") }).await;

        tokio::time::advance(Duration::from_secs(5 * 60)).await;
        table.breaker_for("https://h/fresh");

        let again = table.breaker_for("https://h/active");
        assert!(Arc::ptr_eq(&active, &again));
        assert_eq!(table.len(), 2);
    }
}
