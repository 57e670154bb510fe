//! # Notifier Core
//!
//! Core event-processing engine for the notifier webhook pipeline.
//!
//! This crate contains the pipelined flow from batched event input through
//! per-tenant rate gating, provider resolution, deduplication, retrying
//! delivery with per-destination circuit breaking, and dead-letter routing.
//!
//! ## Architecture
//!
//! The engine depends only on trait abstractions:
//! - External stores ([`dedup::DeduplicationStore`], [`rate_limit::RateGate`])
//!   are injected by the service layer
//! - Provider lookups go through [`provider::EventProvider`] implementations
//! - Dead-letter routing goes through [`processor::DeadLetterPublisher`]
//! - Metrics are recorded through [`monitoring::PipelineMetrics`]
//!
//! The service crate wires Kafka, Redis, and Prometheus implementations into
//! these seams at startup.
//!
//! ## Processing flow
//!
//! ```text
//! batch ──▶ EventPipeline ──▶ groups by event_type
//!                │
//!                ├─ RateGate filter (per event)
//!                ├─ EventProvider bulk lookup (per group)
//!                └─ WorkerPool ──▶ EventProcessor (per event)
//!                                      │
//!                                      ├─ DeduplicationStore
//!                                      ├─ retry ∘ breaker ∘ WebhookClient
//!                                      └─ DeadLetterPublisher on exhaustion
//! ```

/// Domain types for events, payloads, and dead-letter records
pub mod event;

/// Deduplication store abstraction
pub mod dedup;

/// Per-tenant rate gating abstraction
pub mod rate_limit;

/// Provider registry for type-keyed URL and payload resolution
pub mod provider;

/// HTTP webhook delivery client
pub mod delivery;

/// Per-destination circuit breaker table
pub mod circuit_breaker;

/// Exponential backoff retry executor
pub mod retry;

/// Per-event processing (dedup, delivery, dead-letter routing)
pub mod processor;

/// Bounded-concurrency worker pool
pub mod worker_pool;

/// Batch pipeline orchestration
pub mod pipeline;

/// Metrics collection traits
pub mod monitoring;

// Re-export key types for convenience
pub use circuit_breaker::{BreakerError, BreakerTable, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use dedup::{DedupError, DeduplicationStore};
pub use delivery::{DeliveryError, WebhookClient};
pub use event::{DeadLetterRecord, DecodeError, EventPayload, Subscriber, SubscriberEvent, WebhookEvent};
pub use monitoring::{NoOpPipelineMetrics, PipelineMetrics};
pub use pipeline::EventPipeline;
pub use processor::{DeadLetterPublisher, EventProcessor, ProcessError, ProcessOutcome, PublishError};
pub use provider::{EventProvider, ProviderError, ProviderRegistry};
pub use rate_limit::RateGate;
pub use retry::{retry_with_backoff, RetryError, RetryPolicy};
pub use worker_pool::WorkerPool;
