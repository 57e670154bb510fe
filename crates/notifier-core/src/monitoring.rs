//! Metrics collection for pipeline operations.
//!
//! The engine records what happened through this trait; the service layer
//! implements it with Prometheus. Recording is best-effort — implementations
//! must never fail or block business operations.

use std::time::Duration;

/// Metrics recorded by the event-processing pipeline.
///
/// # Thread Safety
///
/// All methods take `&self` to support `Arc<dyn PipelineMetrics>` sharing
/// across worker tasks. Implementations must tolerate concurrent increments.
pub trait PipelineMetrics: Send + Sync {
    /// Record the number of messages received in one consumed batch.
    fn record_events_received(&self, count: usize);

    /// Record the wall-clock time spent processing one batch.
    fn record_batch_processing_time(&self, duration: Duration);

    /// Record one successful webhook delivery.
    fn record_webhook_success(&self);

    /// Record one webhook delivery that exhausted its retries.
    fn record_webhook_failure(&self);

    /// Record one event skipped as a duplicate.
    fn record_duplicate_event(&self);

    /// Record one event dropped by the rate gate.
    fn record_rate_limit_exceeded(&self);
}

/// Metrics collector that discards everything. For tests and tools that do
/// not export metrics.
pub struct NoOpPipelineMetrics;

impl PipelineMetrics for NoOpPipelineMetrics {
    fn record_events_received(&self, _count: usize) {}
    fn record_batch_processing_time(&self, _duration: Duration) {}
    fn record_webhook_success(&self) {}
    fn record_webhook_failure(&self) {}
    fn record_duplicate_event(&self) {}
    fn record_rate_limit_exceeded(&self) {}
}
