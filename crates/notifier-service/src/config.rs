//! Service configuration.
//!
//! Configuration is layered: compiled-in defaults, then an optional
//! `notifier.toml` file, then `NOTIFIER__`-prefixed environment variables
//! (double underscore as the section separator, e.g.
//! `NOTIFIER__KAFKA__BOOTSTRAP_SERVERS`). Durations are expressed as
//! millisecond fields with `Duration` accessors.

use notifier_core::{CircuitBreakerConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error raised when configuration cannot be loaded or parsed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

// ============================================================================
// Service Configuration
// ============================================================================

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Kafka topics, consumer, and producer settings
    pub kafka: KafkaConfig,

    /// Redis connection and rate limit settings
    pub redis: RedisConfig,

    /// Retry and circuit breaker settings
    pub resilience: ResilienceConfig,

    /// Worker pool sizing
    pub worker_pool: WorkerPoolConfig,
}

impl ServiceConfig {
    /// Load configuration from defaults, `notifier.toml`, and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(config::File::with_name("notifier").required(false))
    }

    /// Load configuration with an explicit file source. Used by tests.
    pub fn load_from(
        file: config::File<config::FileSourceFile, config::FileFormat>,
    ) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("NOTIFIER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Retry policy for webhook delivery derived from configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = &self.resilience.retry.webhook_retry;
        RetryPolicy::new(
            Duration::from_millis(retry.wait_duration_ms),
            retry.exponential_backoff_multiplier,
            retry.max_attempts,
        )
    }

    /// Circuit breaker configuration for webhook destinations.
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        let breaker = &self.resilience.circuit_breaker.webhook_circuit_breaker;
        CircuitBreakerConfig {
            // Thresholds are configured as percentages for compatibility
            // with the conventional resilience configuration shape.
            failure_rate_threshold: breaker.failure_rate_threshold / 100.0,
            minimum_calls: breaker.minimum_number_of_calls,
            measurement_interval: Duration::from_millis(breaker.wait_duration_in_open_state_ms),
            wait_duration_in_open_state: Duration::from_millis(
                breaker.wait_duration_in_open_state_ms,
            ),
            permitted_half_open_calls: breaker.permitted_number_of_calls_in_half_open_state,
            slow_call_rate_threshold: breaker.slow_call_rate_threshold / 100.0,
            slow_call_duration_threshold: Duration::from_millis(
                breaker.slow_call_duration_threshold_ms,
            ),
        }
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

// ============================================================================
// Kafka Configuration
// ============================================================================

/// Kafka settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub topics: KafkaTopics,
    pub consumer: KafkaConsumerConfig,
    pub producer: KafkaProducerConfig,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            topics: KafkaTopics::default(),
            consumer: KafkaConsumerConfig::default(),
            producer: KafkaProducerConfig::default(),
        }
    }
}

/// Topic names and partition counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaTopics {
    pub webhook_event: TopicConfig,
    pub dead_letter_queue: TopicConfig,
}

impl Default for KafkaTopics {
    fn default() -> Self {
        Self {
            webhook_event: TopicConfig {
                name: "webhook-events".to_string(),
                partitions: 3,
            },
            dead_letter_queue: TopicConfig {
                name: "webhook-event-dead-letter-queue".to_string(),
                partitions: 3,
            },
        }
    }
}

/// A single topic definition.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TopicConfig {
    pub name: String,
    pub partitions: u32,
}

/// Consumer group and polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConsumerConfig {
    pub group_id: String,
    pub auto_offset_reset: String,
    pub poll_timeout_ms: u64,
    pub max_poll_records: usize,
    pub concurrency: usize,
}

impl Default for KafkaConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: "event-processing-group".to_string(),
            auto_offset_reset: "earliest".to_string(),
            poll_timeout_ms: 3000,
            max_poll_records: 100,
            concurrency: 1,
        }
    }
}

impl KafkaConsumerConfig {
    /// Poll window as a `Duration`.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Producer delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaProducerConfig {
    pub retries: u32,
    pub acks: String,
    pub delivery_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub retry_backoff_ms: u64,
}

impl Default for KafkaProducerConfig {
    fn default() -> Self {
        Self {
            retries: 5,
            acks: "all".to_string(),
            delivery_timeout_ms: 30_000,
            request_timeout_ms: 5_000,
            retry_backoff_ms: 500,
        }
    }
}

// ============================================================================
// Redis Configuration
// ============================================================================

/// Redis connection and rate limit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub limit: RateLimitConfig,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            limit: RateLimitConfig::default(),
        }
    }
}

impl RedisConfig {
    /// Connection URL for the Redis client.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

/// Per-account rate limit: `event` events per `time_window_mins` window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub event: u64,
    pub time_window_mins: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            event: 400,
            time_window_mins: 1,
        }
    }
}

impl RateLimitConfig {
    /// Rate window as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.time_window_mins * 60)
    }
}

// ============================================================================
// Resilience Configuration
// ============================================================================

/// Retry and circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerSection,
}

/// Named retry policies.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RetryConfig {
    pub webhook_retry: WebhookRetryConfig,
}

/// Exponential backoff settings for webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookRetryConfig {
    pub max_attempts: u32,
    pub wait_duration_ms: u64,
    pub exponential_backoff_multiplier: f64,
}

impl Default for WebhookRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            wait_duration_ms: 2000,
            exponential_backoff_multiplier: 2.0,
        }
    }
}

/// Named circuit breakers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CircuitBreakerSection {
    pub webhook_circuit_breaker: WebhookCircuitBreakerConfig,
}

/// Circuit breaker settings for webhook destinations.
///
/// Rate thresholds are percentages (0–100). The slow-call keys are accepted
/// for configuration compatibility but do not feed the trip decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookCircuitBreakerConfig {
    pub failure_rate_threshold: f64,
    pub slow_call_rate_threshold: f64,
    pub slow_call_duration_threshold_ms: u64,
    pub wait_duration_in_open_state_ms: u64,
    pub permitted_number_of_calls_in_half_open_state: u32,
    pub minimum_number_of_calls: u32,
}

impl Default for WebhookCircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            slow_call_rate_threshold: 60.0,
            slow_call_duration_threshold_ms: 2000,
            wait_duration_in_open_state_ms: 10_000,
            permitted_number_of_calls_in_half_open_state: 3,
            minimum_number_of_calls: 5,
        }
    }
}

// ============================================================================
// Worker Pool Configuration
// ============================================================================

/// Worker pool sizing for per-event delivery tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    pub core_size: usize,
    pub max_size: usize,
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            core_size: 10,
            max_size: 50,
            queue_capacity: 100,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
