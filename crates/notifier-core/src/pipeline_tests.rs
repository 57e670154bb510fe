//! Tests for batch pipeline orchestration with fake collaborators.

use super::*;
use crate::circuit_breaker::{BreakerTable, CircuitBreakerConfig};
use crate::dedup::{DedupError, DeduplicationStore};
use crate::delivery::WebhookClient;
use crate::event::{EventPayload, Subscriber, SubscriberEvent};
use crate::processor::{DeadLetterPublisher, PublishError};
use crate::provider::{EventProvider, ProviderError};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Test Doubles
// ============================================================================

/// Dedup store that never reports duplicates.
struct PassThroughDedup;

#[async_trait]
impl DeduplicationStore for PassThroughDedup {
    async fn is_duplicate(&self, _event_id: &str) -> bool {
        false
    }
    async fn mark_processed(&self, _event_id: &str) -> Result<(), DedupError> {
        Ok(())
    }
}

/// Dead-letter publisher that records what it was given.
#[derive(Default)]
struct RecordingDlq {
    records: Mutex<Vec<crate::event::DeadLetterRecord>>,
}

#[async_trait]
impl DeadLetterPublisher for RecordingDlq {
    async fn publish(
        &self,
        record: &crate::event::DeadLetterRecord,
    ) -> Result<(), PublishError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Rate gate admitting a fixed number of events per account.
struct CountingGate {
    limit: u64,
    counts: Mutex<std::collections::HashMap<String, u64>>,
}

impl CountingGate {
    fn with_limit(limit: u64) -> Self {
        Self {
            limit,
            counts: Mutex::new(std::collections::HashMap::new()),
        }
    }
}

#[async_trait]
impl RateGate for CountingGate {
    async fn are_allowed(&self, account_id: &str, count: u32) -> bool {
        if self.limit == 0 {
            return false;
        }
        let mut counts = self.counts.lock().unwrap();
        let total = counts.entry(account_id.to_string()).or_insert(0);
        *total += u64::from(count);
        *total <= self.limit
    }
}

/// Provider serving a fixed URL for every subscriber event, counting bulk
/// lookups and optionally failing or omitting entries.
struct ScriptedProvider {
    url: String,
    fail_lookups: bool,
    omit_url_for: Option<String>,
    omit_payload_for: Option<String>,
    url_lookups: AtomicUsize,
    payload_lookups: AtomicUsize,
}

impl ScriptedProvider {
    fn serving(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fail_lookups: false,
            omit_url_for: None,
            omit_payload_for: None,
            url_lookups: AtomicUsize::new(0),
            payload_lookups: AtomicUsize::new(0),
        }
    }

    fn lookup_count(&self) -> usize {
        self.url_lookups.load(Ordering::SeqCst) + self.payload_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventProvider for ScriptedProvider {
    fn supports(&self, event_type: &str) -> bool {
        event_type == "subscriber"
    }

    async fn webhook_urls(
        &self,
        event_ids: &[String],
    ) -> Result<HashMap<String, String>, ProviderError> {
        self.url_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups {
            return Err(ProviderError::Lookup {
                message: "source down".to_string(),
            });
        }
        Ok(event_ids
            .iter()
            .filter(|id| self.omit_url_for.as_deref() != Some(id.as_str()))
            .map(|id| (id.clone(), self.url.clone()))
            .collect())
    }

    async fn payloads(
        &self,
        event_ids: &[String],
    ) -> Result<HashMap<String, EventPayload>, ProviderError> {
        self.payload_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups {
            return Err(ProviderError::Lookup {
                message: "source down".to_string(),
            });
        }
        Ok(event_ids
            .iter()
            .filter(|id| self.omit_payload_for.as_deref() != Some(id.as_str()))
            .map(|id| {
                let payload = EventPayload::Subscriber(SubscriberEvent {
                    event_name: "subscriber.created".to_string(),
                    event_time: "2024-05-01T00:00:00Z".to_string(),
                    subscriber: Subscriber {
                        id: id.clone(),
                        email: format!("{id}@example.com"),
                        name: id.clone(),
                        account_id: "A1".to_string(),
                    },
                    webhook_id: "wh-1".to_string(),
                });
                (id.clone(), payload)
            })
            .collect())
    }
}

/// Metrics sink counting every recorded signal.
#[derive(Default)]
struct CountingMetrics {
    success: AtomicUsize,
    failure: AtomicUsize,
    rate_limited: AtomicUsize,
}

impl PipelineMetrics for CountingMetrics {
    fn record_events_received(&self, _count: usize) {}
    fn record_batch_processing_time(&self, _duration: Duration) {}
    fn record_webhook_success(&self) {
        self.success.fetch_add(1, Ordering::SeqCst);
    }
    fn record_webhook_failure(&self) {
        self.failure.fetch_add(1, Ordering::SeqCst);
    }
    fn record_duplicate_event(&self) {}
    fn record_rate_limit_exceeded(&self) {
        self.rate_limited.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

struct Harness {
    pipeline: EventPipeline,
    provider: Arc<ScriptedProvider>,
    dlq: Arc<RecordingDlq>,
    metrics: Arc<CountingMetrics>,
}

fn create_harness(gate: CountingGate, provider: ScriptedProvider) -> Harness {
    let provider = Arc::new(provider);
    let dlq = Arc::new(RecordingDlq::default());
    let metrics = Arc::new(CountingMetrics::default());

    let mut registry = ProviderRegistry::new();
    registry.register(Arc::clone(&provider) as Arc<dyn EventProvider>);

    let processor = Arc::new(EventProcessor::new(
        Arc::new(PassThroughDedup),
        WebhookClient::new(Duration::from_secs(2)).unwrap(),
        BreakerTable::new(CircuitBreakerConfig::default()),
        RetryPolicy::new(Duration::from_millis(100), 2.0, 1).without_jitter(),
        Arc::clone(&dlq) as Arc<dyn DeadLetterPublisher>,
        Arc::clone(&metrics) as Arc<dyn PipelineMetrics>,
    ));

    let pipeline = EventPipeline::new(
        Arc::new(gate),
        Arc::new(registry),
        processor,
        WorkerPool::new(8),
        Arc::clone(&metrics) as Arc<dyn PipelineMetrics>,
    );

    Harness {
        pipeline,
        provider,
        dlq,
        metrics,
    }
}

fn events(count: usize, event_type: &str, account_id: &str) -> Vec<WebhookEvent> {
    (0..count)
        .map(|i| WebhookEvent::new(format!("E{i}"), event_type, account_id))
        .collect()
}

// ============================================================================
// Partitioning Tests
// ============================================================================

#[test]
fn test_partition_groups_by_event_type() {
    let mut batch = events(2, "subscriber", "A1");
    batch.extend(events(3, "invoice", "A2"));

    let groups = partition_by_type(batch);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups["subscriber"].len(), 2);
    assert_eq!(groups["invoice"].len(), 3);
}

// ============================================================================
// Batch Processing Tests
// ============================================================================

#[tokio::test]
async fn test_delivers_every_admitted_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let harness = create_harness(
        CountingGate::with_limit(100),
        ScriptedProvider::serving(server.uri()),
    );
    harness
        .pipeline
        .process_batch(events(3, "subscriber", "A1"), &CancellationToken::new())
        .await;

    assert_eq!(harness.metrics.success.load(Ordering::SeqCst), 3);
    assert!(harness.dlq.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_batch_is_a_no_op() {
    let harness = create_harness(
        CountingGate::with_limit(100),
        ScriptedProvider::serving("http://127.0.0.1:1"),
    );
    harness
        .pipeline
        .process_batch(Vec::new(), &CancellationToken::new())
        .await;

    assert_eq!(harness.provider.lookup_count(), 0);
    assert_eq!(harness.metrics.success.load(Ordering::SeqCst), 0);
}

/// Rate-limited events are dropped silently; the rest still deliver.
#[tokio::test]
async fn test_rate_limited_events_are_skipped_not_dead_lettered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let harness = create_harness(
        CountingGate::with_limit(3),
        ScriptedProvider::serving(server.uri()),
    );
    harness
        .pipeline
        .process_batch(events(5, "subscriber", "A1"), &CancellationToken::new())
        .await;

    assert_eq!(harness.metrics.success.load(Ordering::SeqCst), 3);
    assert_eq!(harness.metrics.rate_limited.load(Ordering::SeqCst), 2);
    assert!(harness.dlq.records.lock().unwrap().is_empty());
}

/// A group with every message rate-limited issues no provider lookups.
#[tokio::test]
async fn test_fully_rate_limited_group_skips_provider_lookup() {
    let harness = create_harness(
        CountingGate::with_limit(0),
        ScriptedProvider::serving("http://127.0.0.1:1"),
    );
    harness
        .pipeline
        .process_batch(events(4, "subscriber", "A1"), &CancellationToken::new())
        .await;

    assert_eq!(harness.provider.lookup_count(), 0);
    assert_eq!(harness.metrics.rate_limited.load(Ordering::SeqCst), 4);
}

/// Event types without a provider drop the whole group.
#[tokio::test]
async fn test_unresolved_event_type_drops_group() {
    let harness = create_harness(
        CountingGate::with_limit(100),
        ScriptedProvider::serving("http://127.0.0.1:1"),
    );
    harness
        .pipeline
        .process_batch(events(3, "unknown", "A1"), &CancellationToken::new())
        .await;

    assert_eq!(harness.provider.lookup_count(), 0);
    assert_eq!(harness.metrics.success.load(Ordering::SeqCst), 0);
    assert!(harness.dlq.records.lock().unwrap().is_empty());
}

/// Missing URL or payload means "no subscription": skip silently.
#[tokio::test]
async fn test_events_with_missing_webhook_data_are_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut provider = ScriptedProvider::serving(server.uri());
    provider.omit_url_for = Some("E0".to_string());
    provider.omit_payload_for = Some("E1".to_string());

    let harness = create_harness(CountingGate::with_limit(100), provider);
    harness
        .pipeline
        .process_batch(events(3, "subscriber", "A1"), &CancellationToken::new())
        .await;

    assert_eq!(harness.metrics.success.load(Ordering::SeqCst), 1);
    assert!(harness.dlq.records.lock().unwrap().is_empty());
}

/// Provider lookup errors abort the group without dead-lettering.
#[tokio::test]
async fn test_lookup_error_drops_group_without_dead_letters() {
    let mut provider = ScriptedProvider::serving("http://127.0.0.1:1");
    provider.fail_lookups = true;

    let harness = create_harness(CountingGate::with_limit(100), provider);
    harness
        .pipeline
        .process_batch(events(3, "subscriber", "A1"), &CancellationToken::new())
        .await;

    assert_eq!(harness.metrics.success.load(Ordering::SeqCst), 0);
    assert_eq!(harness.metrics.failure.load(Ordering::SeqCst), 0);
    assert!(harness.dlq.records.lock().unwrap().is_empty());
}

/// Failed deliveries dead-letter per event while the rest of the group
/// still commits its outcomes.
#[tokio::test]
async fn test_failed_delivery_dead_letters_only_that_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let harness = create_harness(
        CountingGate::with_limit(100),
        ScriptedProvider::serving(server.uri()),
    );
    harness
        .pipeline
        .process_batch(events(2, "subscriber", "A1"), &CancellationToken::new())
        .await;

    assert_eq!(harness.metrics.failure.load(Ordering::SeqCst), 2);
    let records = harness.dlq.records.lock().unwrap();
    assert_eq!(records.len(), 2);
    let mut ids: Vec<_> = records.iter().map(|r| r.event_id.clone()).collect();
    ids.sort();
    assert_eq!(ids, ["E0", "E1"]);
}
