//! Kafka producers for the webhook-event and dead-letter topics.
//!
//! Both producers share the same delivery settings (`acks`, retries,
//! timeouts) from configuration. Records are JSON values keyed by event ID
//! so the topic's hash partitioner keeps a given event on one partition.

use crate::config::KafkaConfig;
use async_trait::async_trait;
use notifier_core::processor::{DeadLetterPublisher, PublishError};
use notifier_core::{DeadLetterRecord, WebhookEvent};
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// How long a publish waits for the producer queue before giving up.
const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error from publishing to a Kafka topic.
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to publish record: {0}")]
    Kafka(#[from] KafkaError),
}

fn build_producer(config: &KafkaConfig) -> Result<FutureProducer, KafkaError> {
    ClientConfig::new()
        .set("bootstrap.servers", &config.bootstrap_servers)
        .set("acks", &config.producer.acks)
        .set("retries", config.producer.retries.to_string())
        .set(
            "delivery.timeout.ms",
            config.producer.delivery_timeout_ms.to_string(),
        )
        .set(
            "request.timeout.ms",
            config.producer.request_timeout_ms.to_string(),
        )
        .set(
            "retry.backoff.ms",
            config.producer.retry_backoff_ms.to_string(),
        )
        .create()
}

// ============================================================================
// Event Producer
// ============================================================================

/// Publishing seam for the admission API and DLQ replay.
///
/// Implemented by [`EventProducer`] in production; tests substitute fakes.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event, keyed by its event ID.
    async fn publish(&self, event: &WebhookEvent) -> Result<(), ProducerError>;
}

/// Publishes webhook events onto the event topic.
pub struct EventProducer {
    producer: FutureProducer,
    topic: String,
}

impl EventProducer {
    /// Create a producer for the configured webhook-event topic.
    pub fn new(config: &KafkaConfig) -> Result<Self, KafkaError> {
        Ok(Self {
            producer: build_producer(config)?,
            topic: config.topics.webhook_event.name.clone(),
        })
    }
}

#[async_trait]
impl EventPublisher for EventProducer {
    async fn publish(&self, event: &WebhookEvent) -> Result<(), ProducerError> {
        let payload = serde_json::to_vec(event)?;
        self.producer
            .send(
                FutureRecord::to(&self.topic)
                    .key(&event.event_id)
                    .payload(&payload),
                Timeout::After(ENQUEUE_TIMEOUT),
            )
            .await
            .map_err(|(e, _)| ProducerError::Kafka(e))?;

        debug!(topic = %self.topic, event_id = %event.event_id, "published webhook event");
        Ok(())
    }
}

// ============================================================================
// Dead-Letter Publisher
// ============================================================================

/// Publishes dead-letter records onto the DLQ topic.
pub struct KafkaDeadLetterPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaDeadLetterPublisher {
    /// Create a publisher for the configured dead-letter topic.
    pub fn new(config: &KafkaConfig) -> Result<Self, KafkaError> {
        Ok(Self {
            producer: build_producer(config)?,
            topic: config.topics.dead_letter_queue.name.clone(),
        })
    }
}

#[async_trait]
impl DeadLetterPublisher for KafkaDeadLetterPublisher {
    async fn publish(&self, record: &DeadLetterRecord) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(record).map_err(|e| PublishError {
            message: e.to_string(),
        })?;

        match self
            .producer
            .send(
                FutureRecord::to(&self.topic)
                    .key(&record.event_id)
                    .payload(&payload),
                Timeout::After(ENQUEUE_TIMEOUT),
            )
            .await
        {
            Ok(_) => {
                debug!(topic = %self.topic, event_id = %record.event_id, "published dead letter record");
                Ok(())
            }
            Err((e, _)) => {
                error!(
                    topic = %self.topic,
                    event_id = %record.event_id,
                    error = %e,
                    "failed to publish dead letter record"
                );
                Err(PublishError {
                    message: e.to_string(),
                })
            }
        }
    }
}
