//! Per-tenant rate gating abstraction.
//!
//! The gate keeps a per-account counter over a fixed time window and admits
//! events while the post-increment count stays at or under the configured
//! limit. Like deduplication, the gate **fails open**: a store error admits
//! the event rather than dropping it.
//!
//! Rate-exceeded events are skipped silently by the pipeline — they are not
//! dead-lettered and rely on upstream resubmission.

use async_trait::async_trait;

/// Sliding per-account event counter with a fixed window limit.
#[async_trait]
pub trait RateGate: Send + Sync {
    /// Check whether one event is admitted for the account.
    async fn is_allowed(&self, account_id: &str) -> bool {
        self.are_allowed(account_id, 1).await
    }

    /// Check whether `count` events are admitted for the account.
    ///
    /// The implementation contract: atomically increment the account counter
    /// by `count`, ensure the key carries the window TTL without extending an
    /// existing window, and return `true` iff the post-increment value is at
    /// or under the configured limit. A limit of zero denies everything.
    async fn are_allowed(&self, account_id: &str, count: u32) -> bool;
}
