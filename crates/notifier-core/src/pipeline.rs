//! Batch pipeline orchestration.
//!
//! Takes the decoded events of one consumed batch and drives them to a
//! terminal outcome: delivered, duplicate, rate-skipped, dropped for missing
//! provider data, or dead-lettered. The caller commits offsets only after
//! [`EventPipeline::process_batch`] returns, which is what turns "returned"
//! into the at-least-once guarantee.
//!
//! Scheduling is two-tier: per-type group futures run concurrently inline on
//! the caller's task, while per-event delivery tasks go through the bounded
//! [`WorkerPool`]. Groups never occupy pool slots while waiting on their
//! events, so a small pool cannot deadlock against itself.

use crate::event::WebhookEvent;
use crate::monitoring::PipelineMetrics;
use crate::processor::{EventProcessor, ProcessError, ProcessOutcome};
use crate::provider::ProviderRegistry;
use crate::rate_limit::RateGate;
use crate::worker_pool::WorkerPool;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Orchestrates one batch through rate gating, provider resolution, and
/// per-event processing.
pub struct EventPipeline {
    rate_gate: Arc<dyn RateGate>,
    providers: Arc<ProviderRegistry>,
    processor: Arc<EventProcessor>,
    pool: WorkerPool,
    metrics: Arc<dyn PipelineMetrics>,
}

impl EventPipeline {
    /// Create a pipeline wired to its collaborators.
    pub fn new(
        rate_gate: Arc<dyn RateGate>,
        providers: Arc<ProviderRegistry>,
        processor: Arc<EventProcessor>,
        pool: WorkerPool,
        metrics: Arc<dyn PipelineMetrics>,
    ) -> Self {
        Self {
            rate_gate,
            providers,
            processor,
            pool,
            metrics,
        }
    }

    /// Drive every event of a batch to a terminal outcome.
    ///
    /// Returns only when all group futures and their per-event tasks have
    /// completed, so the caller can safely commit the batch offsets
    /// afterwards.
    pub async fn process_batch(&self, events: Vec<WebhookEvent>, cancel: &CancellationToken) {
        if events.is_empty() {
            return;
        }

        let groups = partition_by_type(events);
        debug!(groups = groups.len(), "processing batch groups");

        join_all(
            groups
                .into_iter()
                .map(|(event_type, group)| self.process_group(event_type, group, cancel)),
        )
        .await;
    }

    /// Process all events of one type: rate filter, bulk provider lookup,
    /// per-event dispatch.
    async fn process_group(
        &self,
        event_type: String,
        events: Vec<WebhookEvent>,
        cancel: &CancellationToken,
    ) {
        debug!(event_type = %event_type, count = events.len(), "processing event group");

        let provider = match self.providers.resolve(&event_type) {
            Some(provider) => provider,
            None => {
                warn!(event_type = %event_type, "no provider for event type, dropping group");
                return;
            }
        };

        // One rate-gate increment per event, even when the whole group ends
        // up dropped later.
        let mut allowed = Vec::with_capacity(events.len());
        for event in events {
            if self.rate_gate.is_allowed(&event.account_id).await {
                allowed.push(event);
            } else {
                warn!(
                    account_id = %event.account_id,
                    event_id = %event.event_id,
                    "rate limit exceeded, skipping event"
                );
                self.metrics.record_rate_limit_exceeded();
            }
        }

        if allowed.is_empty() {
            debug!(event_type = %event_type, "no events admitted after rate limiting");
            return;
        }

        let event_ids: Vec<String> = allowed.iter().map(|e| e.event_id.clone()).collect();

        // Exactly one URL lookup and one payload lookup per group. Lookup
        // errors are systemic: abort the group without dead-lettering and
        // let offsets commit.
        let urls = match provider.webhook_urls(&event_ids).await {
            Ok(urls) => urls,
            Err(e) => {
                error!(event_type = %event_type, error = %e, "webhook URL lookup failed, dropping group");
                return;
            }
        };
        let payloads = match provider.payloads(&event_ids).await {
            Ok(payloads) => payloads,
            Err(e) => {
                error!(event_type = %event_type, error = %e, "payload lookup failed, dropping group");
                return;
            }
        };

        let mut handles = Vec::with_capacity(allowed.len());
        for event in allowed {
            let url = urls
                .get(&event.event_id)
                .filter(|url| !url.is_empty())
                .cloned();
            let payload = payloads.get(&event.event_id).cloned();

            let (url, payload) = match (url, payload) {
                (Some(url), Some(payload)) => (url, payload),
                _ => {
                    // Absent URL or payload means "no subscription", not a
                    // failure: no delivery, no dead letter.
                    debug!(
                        event_id = %event.event_id,
                        "skipping event with missing webhook data"
                    );
                    continue;
                }
            };

            let processor = Arc::clone(&self.processor);
            let cancel = cancel.clone();
            let handle = self
                .pool
                .submit(async move {
                    match processor.process(&event, &url, &payload, &cancel).await {
                        Ok(ProcessOutcome::Delivered) => {
                            debug!(event_id = %event.event_id, "event processed");
                        }
                        Ok(ProcessOutcome::Duplicate) => {
                            debug!(event_id = %event.event_id, "event skipped as duplicate");
                        }
                        Err(ProcessError::Cancelled) => {
                            debug!(event_id = %event.event_id, "event processing cancelled");
                        }
                        Err(e) => {
                            // Already counted and dead-lettered by the
                            // processor; nothing further to decide here.
                            warn!(error = %e, "event processing failed");
                        }
                    }
                })
                .await;
            handles.push(handle);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(event_type = %event_type, error = %e, "event task panicked");
            }
        }
    }
}

/// Partition a batch into per-event-type groups.
pub(crate) fn partition_by_type(events: Vec<WebhookEvent>) -> HashMap<String, Vec<WebhookEvent>> {
    let mut groups: HashMap<String, Vec<WebhookEvent>> = HashMap::new();
    for event in events {
        groups
            .entry(event.event_type.clone())
            .or_default()
            .push(event);
    }
    groups
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
