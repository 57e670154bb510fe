//! Kafka batch consumer driving the core pipeline.
//!
//! The consumer loop is single-threaded and owns offset commits. Each
//! iteration polls up to `max_poll_records` messages within the poll window,
//! decodes them (malformed messages are logged and dropped), hands the batch
//! to the pipeline, and only then commits the offsets of *every* polled
//! message — including dropped ones. A crash before the commit re-reads the
//! batch; deduplication suppresses the resulting duplicates.

use crate::config::ServiceConfig;
use notifier_core::{EventPipeline, PipelineMetrics, WebhookEvent};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::OwnedMessage;
use rdkafka::{ClientConfig, Message, Offset, TopicPartitionList};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pause after a poll error before retrying, to avoid a hot error loop.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Batch consumer for the webhook-event topic.
pub struct BatchConsumer {
    consumer: StreamConsumer,
    pipeline: Arc<EventPipeline>,
    metrics: Arc<dyn PipelineMetrics>,
    topic: String,
    max_poll_records: usize,
    poll_timeout: Duration,
}

impl BatchConsumer {
    /// Create a consumer subscribed to the configured webhook-event topic.
    ///
    /// Auto-commit is disabled; offsets are committed manually once per
    /// fully processed batch.
    pub fn new(
        config: &ServiceConfig,
        pipeline: Arc<EventPipeline>,
        metrics: Arc<dyn PipelineMetrics>,
    ) -> Result<Self, KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.kafka.bootstrap_servers)
            .set("group.id", &config.kafka.consumer.group_id)
            .set("auto.offset.reset", &config.kafka.consumer.auto_offset_reset)
            .set("enable.auto.commit", "false")
            .create()?;

        let topic = config.kafka.topics.webhook_event.name.clone();
        consumer.subscribe(&[&topic])?;

        Ok(Self {
            consumer,
            pipeline,
            metrics,
            topic,
            max_poll_records: config.kafka.consumer.max_poll_records,
            poll_timeout: config.kafka.consumer.poll_timeout(),
        })
    }

    /// Run the consume loop until the cancellation token fires.
    ///
    /// Shutdown is graceful: a partially polled batch is still processed and
    /// committed before the loop exits.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(topic = %self.topic, "starting batch consumer");

        while !cancel.is_cancelled() {
            let messages = self.poll_batch(&cancel).await;
            if messages.is_empty() {
                continue;
            }

            let started = std::time::Instant::now();
            self.metrics.record_events_received(messages.len());
            debug!(count = messages.len(), "received batch");

            let events = decode_batch(&messages);
            self.pipeline.process_batch(events, &cancel).await;

            if let Err(e) = self.commit_batch(&messages) {
                error!(error = %e, "failed to commit batch offsets");
            }

            self.metrics.record_batch_processing_time(started.elapsed());
        }

        info!(topic = %self.topic, "batch consumer stopped");
    }

    /// Poll up to `max_poll_records` messages within the poll window.
    ///
    /// Returns early with whatever was read when the window elapses or the
    /// token fires.
    async fn poll_batch(&self, cancel: &CancellationToken) -> Vec<OwnedMessage> {
        let deadline = tokio::time::Instant::now() + self.poll_timeout;
        let mut messages = Vec::new();

        while messages.len() < self.max_poll_records {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                polled = tokio::time::timeout(remaining, self.consumer.recv()) => {
                    match polled {
                        Ok(Ok(message)) => messages.push(message.detach()),
                        Ok(Err(e)) => {
                            error!(error = %e, "error polling Kafka");
                            tokio::time::sleep(POLL_ERROR_BACKOFF.min(remaining)).await;
                        }
                        // Poll window elapsed; proceed with what was read.
                        Err(_) => break,
                    }
                }
            }
        }

        messages
    }

    /// Commit the next offset for every partition seen in the batch.
    fn commit_batch(&self, messages: &[OwnedMessage]) -> Result<(), KafkaError> {
        let mut offsets = TopicPartitionList::new();
        for ((topic, partition), offset) in batch_offsets(messages) {
            offsets.add_partition_offset(&topic, partition, Offset::Offset(offset + 1))?;
        }

        self.consumer.commit(&offsets, CommitMode::Async)?;
        debug!(partitions = offsets.count(), "committed batch offsets");
        Ok(())
    }
}

/// Decode a polled batch, dropping malformed messages.
///
/// Dropped messages still count toward the committed offsets: a message
/// that cannot be decoded will never become decodable on a re-read.
pub(crate) fn decode_batch(messages: &[OwnedMessage]) -> Vec<WebhookEvent> {
    messages
        .iter()
        .filter_map(|message| {
            let payload = match message.payload() {
                Some(payload) => payload,
                None => {
                    warn!(
                        partition = message.partition(),
                        offset = message.offset(),
                        "dropping message without payload"
                    );
                    return None;
                }
            };

            match WebhookEvent::decode(payload) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(
                        partition = message.partition(),
                        offset = message.offset(),
                        error = %e,
                        "dropping malformed event message"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Highest offset per (topic, partition) in the batch.
pub(crate) fn batch_offsets(messages: &[OwnedMessage]) -> HashMap<(String, i32), i64> {
    let mut offsets: HashMap<(String, i32), i64> = HashMap::new();
    for message in messages {
        let key = (message.topic().to_string(), message.partition());
        let offset = offsets.entry(key).or_insert(message.offset());
        *offset = (*offset).max(message.offset());
    }
    offsets
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
