//! Per-event processing: dedup, retrying delivery, dead-letter routing.
//!
//! [`EventProcessor`] is the single place that distinguishes "delivered"
//! from "dead-lettered". Layers above only count and log; layers below
//! (client, breaker, retry) report errors without making policy decisions.

use crate::circuit_breaker::{BreakerError, BreakerTable};
use crate::dedup::DeduplicationStore;
use crate::delivery::WebhookClient;
use crate::event::{DeadLetterRecord, EventPayload, WebhookEvent};
use crate::monitoring::PipelineMetrics;
use crate::retry::{retry_with_backoff, RetryError, RetryPolicy};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Failure reason recorded on dead-letter records for exhausted deliveries.
pub const FAILURE_REASON_RETRIES_EXHAUSTED: &str = "Webhook delivery failed after retries";

// ============================================================================
// DeadLetterPublisher
// ============================================================================

/// Emits failure records to the dead-letter channel.
///
/// Publish failures must never block progress: the processor logs and
/// swallows them, and the owning batch still commits its offsets.
#[async_trait]
pub trait DeadLetterPublisher: Send + Sync {
    /// Publish a dead-letter record, keyed by its event ID.
    async fn publish(&self, record: &DeadLetterRecord) -> Result<(), PublishError>;
}

/// Error from a dead-letter publish attempt.
#[derive(Debug, Error)]
#[error("dead letter publish failed: {message}")]
pub struct PublishError {
    pub message: String,
}

// ============================================================================
// Processing Outcome
// ============================================================================

/// Terminal outcome of processing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The payload reached the destination.
    Delivered,

    /// The event was already processed within the dedup window; no POST was
    /// made.
    Duplicate,
}

/// Terminal failure of processing one event.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Delivery exhausted its retries; a dead-letter record was emitted.
    #[error("webhook delivery failed for event {event_id}: {last_error}")]
    DeliveryFailed {
        event_id: String,
        last_error: String,
    },

    /// Processing was interrupted by shutdown; no dead-letter record is
    /// emitted for an outcome we never observed.
    #[error("event processing cancelled")]
    Cancelled,
}

// ============================================================================
// EventProcessor
// ============================================================================

/// Orchestrates dedup, breaker-guarded retrying delivery, and dead-letter
/// routing for one event.
pub struct EventProcessor {
    dedup: Arc<dyn DeduplicationStore>,
    client: WebhookClient,
    breakers: BreakerTable,
    retry_policy: RetryPolicy,
    dlq: Arc<dyn DeadLetterPublisher>,
    metrics: Arc<dyn PipelineMetrics>,
}

impl EventProcessor {
    /// Create a processor wired to its collaborators.
    pub fn new(
        dedup: Arc<dyn DeduplicationStore>,
        client: WebhookClient,
        breakers: BreakerTable,
        retry_policy: RetryPolicy,
        dlq: Arc<dyn DeadLetterPublisher>,
        metrics: Arc<dyn PipelineMetrics>,
    ) -> Self {
        Self {
            dedup,
            client,
            breakers,
            retry_policy,
            dlq,
            metrics,
        }
    }

    /// Process one event with its resolved destination and payload.
    ///
    /// # Behavior
    ///
    /// 1. Duplicates short-circuit to [`ProcessOutcome::Duplicate`].
    /// 2. The event is marked processed *before* delivery so duplicate
    ///    detection wins over racing retries from other consumer instances;
    ///    marking failures are logged and ignored.
    /// 3. Delivery runs under the destination's circuit breaker inside the
    ///    retry executor.
    /// 4. Exhausted retries publish a [`DeadLetterRecord`] and return
    ///    [`ProcessError::DeliveryFailed`].
    pub async fn process(
        &self,
        event: &WebhookEvent,
        url: &str,
        payload: &EventPayload,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutcome, ProcessError> {
        if self.dedup.is_duplicate(&event.event_id).await {
            info!(event_id = %event.event_id, "skipping duplicate event");
            self.metrics.record_duplicate_event();
            return Ok(ProcessOutcome::Duplicate);
        }

        if let Err(e) = self.dedup.mark_processed(&event.event_id).await {
            warn!(
                event_id = %event.event_id,
                error = %e,
                "failed to mark event as processed, continuing"
            );
        }

        let breaker = self.breakers.breaker_for(url);
        let client = &self.client;
        let attempt = || {
            let breaker = Arc::clone(&breaker);
            async move { breaker.call(|| client.send(url, payload)).await }
        };

        match retry_with_backoff(&self.retry_policy, cancel, attempt).await {
            Ok(()) => {
                info!(event_id = %event.event_id, url = %url, "webhook delivered");
                self.metrics.record_webhook_success();
                Ok(ProcessOutcome::Delivered)
            }
            Err(RetryError::Cancelled) => {
                warn!(event_id = %event.event_id, "webhook delivery cancelled");
                Err(ProcessError::Cancelled)
            }
            Err(RetryError::Exhausted { last_error }) => {
                warn!(
                    event_id = %event.event_id,
                    url = %url,
                    error = %last_error,
                    "webhook delivery failed after retries"
                );
                self.metrics.record_webhook_failure();

                let message = last_error_message(event, &last_error);
                let record = DeadLetterRecord::from_event(
                    event,
                    message.clone(),
                    FAILURE_REASON_RETRIES_EXHAUSTED,
                );
                if let Err(e) = self.dlq.publish(&record).await {
                    error!(
                        event_id = %event.event_id,
                        error = %e,
                        "failed to publish dead letter record"
                    );
                }

                Err(ProcessError::DeliveryFailed {
                    event_id: event.event_id.clone(),
                    last_error: message,
                })
            }
        }
    }
}

/// Render the last delivery error for the dead-letter record.
///
/// Response failures are reported against the event rather than leaking
/// transport detail into the record; breaker rejections keep their own
/// message so operators can tell fast-fails from real attempts.
fn last_error_message(
    event: &WebhookEvent,
    error: &BreakerError<crate::delivery::DeliveryError>,
) -> String {
    match error {
        BreakerError::Operation(_) => {
            format!("webhook response failed for event: {}", event.event_id)
        }
        protection => protection.to_string(),
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
