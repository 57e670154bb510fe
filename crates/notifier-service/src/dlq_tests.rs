//! Tests for the dead-letter inspection buffer.

use super::*;
use notifier_core::WebhookEvent;

fn record(event_id: &str) -> DeadLetterRecord {
    DeadLetterRecord::from_event(
        &WebhookEvent::new(event_id, "subscriber", "A1"),
        "boom",
        "delivery failed",
    )
}

#[test]
fn test_records_are_retained_in_order() {
    let buffer = DlqBuffer::new(10);
    buffer.record(record("E1"));
    buffer.record(record("E2"));

    let snapshot = buffer.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].event_id, "E1");
    assert_eq!(snapshot[1].event_id, "E2");
}

#[test]
fn test_oldest_records_are_evicted_at_capacity() {
    let buffer = DlqBuffer::new(2);
    buffer.record(record("E1"));
    buffer.record(record("E2"));
    buffer.record(record("E3"));

    let ids: Vec<_> = buffer.snapshot().iter().map(|r| r.event_id.clone()).collect();
    assert_eq!(ids, ["E2", "E3"]);
}

#[test]
fn test_take_removes_only_matching_records() {
    let buffer = DlqBuffer::new(10);
    buffer.record(record("E1"));
    buffer.record(record("E2"));
    buffer.record(record("E3"));

    let taken = buffer.take(&["E1".to_string(), "E3".to_string()]);
    let taken_ids: Vec<_> = taken.iter().map(|r| r.event_id.clone()).collect();
    assert_eq!(taken_ids, ["E1", "E3"]);

    let remaining: Vec<_> = buffer.snapshot().iter().map(|r| r.event_id.clone()).collect();
    assert_eq!(remaining, ["E2"]);
}

#[test]
fn test_take_with_unknown_ids_is_empty() {
    let buffer = DlqBuffer::new(10);
    buffer.record(record("E1"));

    assert!(buffer.take(&["E9".to_string()]).is_empty());
    assert_eq!(buffer.len(), 1);
}

/// The tee publisher records into the buffer and forwards downstream.
#[tokio::test]
async fn test_buffered_publisher_tees_records() {
    struct CountingPublisher(std::sync::atomic::AtomicUsize);

    #[async_trait]
    impl DeadLetterPublisher for CountingPublisher {
        async fn publish(&self, _record: &DeadLetterRecord) -> Result<(), PublishError> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    let buffer = Arc::new(DlqBuffer::new(10));
    let publisher = BufferedDeadLetterPublisher::new(
        CountingPublisher(std::sync::atomic::AtomicUsize::new(0)),
        Arc::clone(&buffer),
    );

    publisher.publish(&record("E1")).await.unwrap();

    assert_eq!(buffer.len(), 1);
    assert_eq!(publisher.inner.0.load(std::sync::atomic::Ordering::SeqCst), 1);
}
