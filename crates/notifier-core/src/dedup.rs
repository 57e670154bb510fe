//! Deduplication store abstraction.
//!
//! Deduplication is advisory: the pipeline guarantees at-least-once delivery,
//! and this store suppresses most duplicates within its retention window.
//! Implementations are expected to **fail open** — when the backing store is
//! unavailable, a duplicate check reports "not a duplicate" so that real
//! events are never dropped on store outages. Duplicate delivery is
//! acceptable; losing an event is not.

use async_trait::async_trait;
use thiserror::Error;

/// Set-with-expiry of recently processed event IDs.
///
/// # Thread Safety
///
/// Methods take `&self` so implementations can be shared as
/// `Arc<dyn DeduplicationStore>` across worker tasks.
#[async_trait]
pub trait DeduplicationStore: Send + Sync {
    /// Check whether an event was already processed within the retention
    /// window.
    ///
    /// Must return `false` on store errors (fail-open).
    async fn is_duplicate(&self, event_id: &str) -> bool;

    /// Mark an event as processed.
    ///
    /// Called before delivery so that duplicate detection wins over racing
    /// retries from other consumer instances. Callers treat failures as
    /// best-effort: they log and continue.
    async fn mark_processed(&self, event_id: &str) -> Result<(), DedupError>;
}

/// Error from the deduplication store.
#[derive(Debug, Error)]
pub enum DedupError {
    /// The backing store rejected or failed the operation.
    #[error("deduplication store unavailable: {message}")]
    Store { message: String },
}
