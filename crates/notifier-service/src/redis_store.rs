//! Redis-backed deduplication store and rate gate.
//!
//! Both stores are advisory and fail open: a Redis outage must never drop a
//! real event, so check errors are logged and answered permissively while
//! the pipeline keeps moving.

use crate::config::RedisConfig;
use async_trait::async_trait;
use notifier_core::dedup::{DedupError, DeduplicationStore};
use notifier_core::rate_limit::RateGate;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, warn};

/// Key prefix for deduplication entries.
const DEDUP_KEY_PREFIX: &str = "dedup:event:";

/// Retention of deduplication entries; duplicates older than this window
/// cannot be suppressed.
const DEDUP_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Key prefix for per-account rate counters.
const RATE_KEY_PREFIX: &str = "rate:limit:";

/// Open a managed connection to Redis.
///
/// The connection manager reconnects transparently and is cheap to clone;
/// every store shares one underlying multiplexed connection.
pub async fn connect(config: &RedisConfig) -> Result<ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(config.url())?;
    ConnectionManager::new(client).await
}

fn dedup_key(event_id: &str) -> String {
    format!("{DEDUP_KEY_PREFIX}{event_id}")
}

fn rate_key(account_id: &str) -> String {
    format!("{RATE_KEY_PREFIX}{account_id}")
}

// ============================================================================
// Deduplication Store
// ============================================================================

/// Deduplication store over Redis `EXISTS`/`SET EX`.
#[derive(Clone)]
pub struct RedisDeduplicationStore {
    conn: ConnectionManager,
}

impl RedisDeduplicationStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl DeduplicationStore for RedisDeduplicationStore {
    async fn is_duplicate(&self, event_id: &str) -> bool {
        let mut conn = self.conn.clone();
        match conn.exists::<_, bool>(dedup_key(event_id)).await {
            Ok(exists) => {
                debug!(event_id = %event_id, duplicate = exists, "checked duplicate");
                exists
            }
            Err(e) => {
                warn!(
                    event_id = %event_id,
                    error = %e,
                    "duplicate check failed, proceeding as not duplicate"
                );
                false
            }
        }
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), DedupError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(dedup_key(event_id), 1, DEDUP_TTL.as_secs())
            .await
            .map_err(|e| DedupError::Store {
                message: e.to_string(),
            })
    }
}

// ============================================================================
// Rate Gate
// ============================================================================

/// Rate gate over a Redis counter with a fixed window TTL.
///
/// The window TTL is pinned with `SET NX EX` before the increment, so later
/// increments never extend an existing window — the counter expires exactly
/// one window after its first event.
#[derive(Clone)]
pub struct RedisRateGate {
    conn: ConnectionManager,
    event_limit: u64,
    window: Duration,
}

impl RedisRateGate {
    pub fn new(conn: ConnectionManager, event_limit: u64, window: Duration) -> Self {
        Self {
            conn,
            event_limit,
            window,
        }
    }

    async fn increment(&self, key: &str, count: u32) -> Result<i64, redis::RedisError> {
        let mut conn = self.conn.clone();
        let _: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(0)
            .arg("NX")
            .arg("EX")
            .arg(self.window.as_secs())
            .query_async(&mut conn)
            .await?;
        conn.incr(key, i64::from(count)).await
    }
}

#[async_trait]
impl RateGate for RedisRateGate {
    async fn are_allowed(&self, account_id: &str, count: u32) -> bool {
        if self.event_limit == 0 {
            return false;
        }

        let key = rate_key(account_id);
        match self.increment(&key, count).await {
            Ok(total) => {
                let allowed = total <= self.event_limit as i64;
                if !allowed {
                    warn!(
                        account_id = %account_id,
                        total = total,
                        limit = self.event_limit,
                        "rate limit exceeded"
                    );
                }
                allowed
            }
            Err(e) => {
                warn!(
                    account_id = %account_id,
                    error = %e,
                    "rate limit check failed, allowing event"
                );
                true
            }
        }
    }
}

#[cfg(test)]
#[path = "redis_store_tests.rs"]
mod tests;
