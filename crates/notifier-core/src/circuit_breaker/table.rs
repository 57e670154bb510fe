//! Keyed breaker table mapping destination URLs to their breakers.

use super::{CircuitBreaker, CircuitBreakerConfig};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

/// Entries idle longer than this are dropped when a new destination is
/// first seen. Evicting a closed breaker is safe; an evicted open breaker
/// simply reopens on the next failure.
const IDLE_EVICTION_THRESHOLD: Duration = Duration::from_secs(10 * 60);

/// Table of per-destination circuit breakers.
///
/// Entries are created lazily on first use of a URL and shared across worker
/// tasks. Insertion and lookup are serialized by the table lock; entry state
/// is serialized by each breaker's own lock.
pub struct BreakerTable {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerTable {
    /// Create a table whose breakers share one configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Get or lazily create the breaker for a destination URL.
    pub fn breaker_for(&self, url: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.read_lock().get(url) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.write_lock();
        // Double-check under the write lock: another task may have inserted
        // the entry between our read and write.
        if let Some(breaker) = breakers.get(url) {
            return Arc::clone(breaker);
        }

        Self::evict_idle(&mut breakers);

        let breaker = Arc::new(CircuitBreaker::new(url, self.config.clone()));
        breakers.insert(url.to_string(), Arc::clone(&breaker));
        debug!(destination = %url, tracked = breakers.len(), "created circuit breaker");
        breaker
    }

    /// Number of tracked destinations.
    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    /// Check whether any destinations are tracked.
    pub fn is_empty(&self) -> bool {
        self.read_lock().is_empty()
    }

    /// Drop entries that have not been consulted recently.
    ///
    /// Runs opportunistically on the insert path so the table stays bounded
    /// under high destination cardinality without a background task.
    fn evict_idle(breakers: &mut HashMap<String, Arc<CircuitBreaker>>) {
        breakers.retain(|url, breaker| {
            let keep = breaker.last_used().elapsed() < IDLE_EVICTION_THRESHOLD;
            if !keep {
                debug!(destination = %url, "evicted idle circuit breaker");
            }
            keep
        });
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<CircuitBreaker>>> {
        self.breakers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<CircuitBreaker>>> {
        self.breakers.write().unwrap_or_else(|e| e.into_inner())
    }
}
