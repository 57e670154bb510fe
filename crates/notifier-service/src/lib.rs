//! # Notifier Service
//!
//! Runnable webhook notification pipeline.
//!
//! Wires the `notifier-core` engine to its infrastructure:
//! - Kafka batch consumer with manual per-batch offset commits
//! - Kafka producers for the webhook-event and dead-letter topics
//! - Redis-backed deduplication and rate gating
//! - The subscriber event provider
//! - An HTTP API for event admission, DLQ inspection/replay, health, and
//!   Prometheus metrics
//!
//! The binary entry point lives in `main.rs`; everything here is also
//! reachable as a library for integration tests.

/// Configuration loading and defaults
pub mod config;

/// Kafka batch consumer driving the core pipeline
pub mod consumer;

/// Kafka producers for the webhook-event and dead-letter topics
pub mod producer;

/// Redis-backed deduplication store and rate gate
pub mod redis_store;

/// Event providers backed by the subscription data source
pub mod providers;

/// In-memory tail of recently dead-lettered records
pub mod dlq;

/// HTTP API: admission, DLQ inspection/replay, health, metrics
pub mod api;

/// Prometheus metrics for the pipeline
pub mod metrics;

pub use config::ServiceConfig;
pub use consumer::BatchConsumer;
pub use dlq::{BufferedDeadLetterPublisher, DlqBuffer};
pub use metrics::ServiceMetrics;
pub use producer::{EventProducer, EventPublisher, KafkaDeadLetterPublisher};
pub use providers::SubscriberEventProvider;
pub use redis_store::{RedisDeduplicationStore, RedisRateGate};
