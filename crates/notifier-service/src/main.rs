//! # Notifier Service
//!
//! Binary entry point for the webhook notification pipeline.
//!
//! This executable:
//! - Loads configuration from defaults, `notifier.toml`, and environment
//! - Initializes structured logging
//! - Connects Redis and Kafka and wires the core engine
//! - Starts the HTTP API and the batch consumer loop
//! - Drains in-flight work and exits 0 on SIGINT/SIGTERM

use anyhow::Context;
use notifier_core::{
    BreakerTable, EventPipeline, EventProcessor, PipelineMetrics, ProviderRegistry, WebhookClient,
    WorkerPool,
};
use notifier_service::api::{self, ApiState};
use notifier_service::{
    BatchConsumer, BufferedDeadLetterPublisher, DlqBuffer, EventProducer, EventPublisher,
    KafkaDeadLetterPublisher, RedisDeduplicationStore, RedisRateGate, ServiceConfig,
    ServiceMetrics, SubscriberEventProvider,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long shutdown waits for in-flight batches to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notifier_service=info,notifier_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting notifier service");

    let config = ServiceConfig::load().context("failed to load configuration")?;

    // External stores
    let redis_conn = notifier_service::redis_store::connect(&config.redis)
        .await
        .context("failed to connect to Redis")?;
    let dedup = Arc::new(RedisDeduplicationStore::new(redis_conn.clone()));
    let rate_gate = Arc::new(RedisRateGate::new(
        redis_conn,
        config.redis.limit.event,
        config.redis.limit.window(),
    ));

    // Observability
    let metrics = ServiceMetrics::new().context("failed to register metrics")?;

    // Dead-letter path: Kafka topic plus the in-memory inspection tail
    let dlq_buffer = Arc::new(DlqBuffer::default());
    let dlq_publisher = Arc::new(BufferedDeadLetterPublisher::new(
        KafkaDeadLetterPublisher::new(&config.kafka)
            .context("failed to create DLQ producer")?,
        Arc::clone(&dlq_buffer),
    ));

    // Core engine
    let client = WebhookClient::new(notifier_core::delivery::DEFAULT_REQUEST_TIMEOUT)
        .context("failed to create HTTP client")?;
    let processor = Arc::new(EventProcessor::new(
        dedup,
        client,
        BreakerTable::new(config.breaker_config()),
        config.retry_policy(),
        dlq_publisher,
        Arc::clone(&metrics) as Arc<dyn PipelineMetrics>,
    ));

    let mut providers = ProviderRegistry::new();
    providers.register(Arc::new(SubscriberEventProvider::new()));

    let pipeline = Arc::new(EventPipeline::new(
        rate_gate,
        Arc::new(providers),
        processor,
        WorkerPool::new(config.worker_pool.max_size),
        Arc::clone(&metrics) as Arc<dyn PipelineMetrics>,
    ));

    // Kafka endpoints
    let consumer = BatchConsumer::new(
        &config,
        pipeline,
        Arc::clone(&metrics) as Arc<dyn PipelineMetrics>,
    )
    .context("failed to create Kafka consumer")?;
    let producer: Arc<dyn EventPublisher> = Arc::new(
        EventProducer::new(&config.kafka).context("failed to create Kafka producer")?,
    );

    let cancel = CancellationToken::new();

    // HTTP API
    let app = api::router(ApiState {
        producer,
        dlq_buffer,
    });
    let listener =
        tokio::net::TcpListener::bind((config.server.address.as_str(), config.server.port))
            .await
            .with_context(|| {
                format!(
                    "failed to bind {}:{}",
                    config.server.address, config.server.port
                )
            })?;
    info!(
        address = %config.server.address,
        port = config.server.port,
        "HTTP server listening"
    );

    let server_cancel = cancel.clone();
    let server = tokio::spawn(async move {
        let shutdown = async move { server_cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!(error = %e, "HTTP server failed");
        }
    });

    // Consumer loop
    let consumer_cancel = cancel.clone();
    let consumer_task = tokio::spawn(async move {
        consumer.run(consumer_cancel).await;
    });

    // Wait for a termination signal
    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }

    info!("shutting down, draining in-flight work");
    cancel.cancel();

    if tokio::time::timeout(SHUTDOWN_GRACE, consumer_task)
        .await
        .is_err()
    {
        error!("consumer did not drain within the shutdown grace period");
    }
    if tokio::time::timeout(SHUTDOWN_GRACE, server).await.is_err() {
        error!("HTTP server did not stop within the shutdown grace period");
    }

    info!("notifier service stopped");
    Ok(())
}
