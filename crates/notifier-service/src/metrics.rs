//! Prometheus metrics for the pipeline.
//!
//! Registered once at startup against the default registry and exposed in
//! text format by the `/metrics` endpoint.

use notifier_core::PipelineMetrics;
use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;
use std::time::Duration;

/// Pipeline metrics backed by Prometheus collectors.
#[derive(Debug)]
pub struct ServiceMetrics {
    pub kafka_event_count: IntCounter,
    pub kafka_batch_processing_time: Histogram,
    pub webhook_success_count: IntCounter,
    pub webhook_failure_count: IntCounter,
    pub duplicate_event_count: IntCounter,
    pub rate_limit_exceeded_count: IntCounter,
}

impl ServiceMetrics {
    /// Register all collectors against the process-wide default registry.
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        Self::with_registry(prometheus::default_registry())
    }

    /// Register all collectors against an explicit registry. Used by tests
    /// to avoid cross-test registration conflicts.
    pub fn with_registry(registry: &Registry) -> Result<Arc<Self>, prometheus::Error> {
        let kafka_event_count = IntCounter::new(
            "kafka_event_count",
            "Total number of events received from Kafka",
        )?;
        let kafka_batch_processing_time = Histogram::with_opts(HistogramOpts::new(
            "kafka_batch_processing_time_seconds",
            "Time taken to process a batch of Kafka events",
        ))?;
        let webhook_success_count = IntCounter::new(
            "webhook_success_count",
            "Total number of successful webhook deliveries",
        )?;
        let webhook_failure_count = IntCounter::new(
            "webhook_failure_count",
            "Total number of failed webhook deliveries",
        )?;
        let duplicate_event_count = IntCounter::new(
            "duplicate_event_count",
            "Total number of duplicate events detected",
        )?;
        let rate_limit_exceeded_count = IntCounter::new(
            "rate_limit_exceeded_count",
            "Total number of events that exceeded rate limits",
        )?;

        registry.register(Box::new(kafka_event_count.clone()))?;
        registry.register(Box::new(kafka_batch_processing_time.clone()))?;
        registry.register(Box::new(webhook_success_count.clone()))?;
        registry.register(Box::new(webhook_failure_count.clone()))?;
        registry.register(Box::new(duplicate_event_count.clone()))?;
        registry.register(Box::new(rate_limit_exceeded_count.clone()))?;

        Ok(Arc::new(Self {
            kafka_event_count,
            kafka_batch_processing_time,
            webhook_success_count,
            webhook_failure_count,
            duplicate_event_count,
            rate_limit_exceeded_count,
        }))
    }
}

impl PipelineMetrics for ServiceMetrics {
    fn record_events_received(&self, count: usize) {
        self.kafka_event_count.inc_by(count as u64);
    }

    fn record_batch_processing_time(&self, duration: Duration) {
        self.kafka_batch_processing_time
            .observe(duration.as_secs_f64());
    }

    fn record_webhook_success(&self) {
        self.webhook_success_count.inc();
    }

    fn record_webhook_failure(&self) {
        self.webhook_failure_count.inc();
    }

    fn record_duplicate_event(&self) {
        self.duplicate_event_count.inc();
    }

    fn record_rate_limit_exceeded(&self) {
        self.rate_limit_exceeded_count.inc();
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
