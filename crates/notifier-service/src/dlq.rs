//! In-memory tail of recently dead-lettered records.
//!
//! The dead-letter topic is the durable record; this buffer only backs the
//! inspection and replay endpoints with the most recent records seen by
//! *this* instance, without requiring a consumer on the DLQ topic.

use async_trait::async_trait;
use notifier_core::processor::{DeadLetterPublisher, PublishError};
use notifier_core::DeadLetterRecord;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Default number of retained records.
pub const DEFAULT_DLQ_BUFFER_CAPACITY: usize = 1000;

// ============================================================================
// DlqBuffer
// ============================================================================

/// Bounded ring buffer of dead-letter records.
pub struct DlqBuffer {
    capacity: usize,
    records: Mutex<VecDeque<DeadLetterRecord>>,
}

impl DlqBuffer {
    /// Create a buffer retaining up to `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::new()),
        }
    }

    /// Append a record, evicting the oldest when full.
    pub fn record(&self, record: DeadLetterRecord) {
        let mut records = self.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Snapshot of the retained records, oldest first.
    pub fn snapshot(&self) -> Vec<DeadLetterRecord> {
        self.lock().iter().cloned().collect()
    }

    /// Remove and return the records matching the given event IDs.
    pub fn take(&self, event_ids: &[String]) -> Vec<DeadLetterRecord> {
        let mut records = self.lock();
        let mut taken = Vec::new();
        records.retain(|record| {
            if event_ids.contains(&record.event_id) {
                taken.push(record.clone());
                false
            } else {
                true
            }
        });
        taken
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<DeadLetterRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for DlqBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_DLQ_BUFFER_CAPACITY)
    }
}

// ============================================================================
// BufferedDeadLetterPublisher
// ============================================================================

/// Dead-letter publisher that also records into the inspection buffer.
///
/// The buffer is updated even when the downstream publish fails — an
/// operator inspecting the DLQ should see the failure either way.
pub struct BufferedDeadLetterPublisher<P> {
    inner: P,
    buffer: Arc<DlqBuffer>,
}

impl<P> BufferedDeadLetterPublisher<P> {
    pub fn new(inner: P, buffer: Arc<DlqBuffer>) -> Self {
        Self { inner, buffer }
    }
}

#[async_trait]
impl<P: DeadLetterPublisher> DeadLetterPublisher for BufferedDeadLetterPublisher<P> {
    async fn publish(&self, record: &DeadLetterRecord) -> Result<(), PublishError> {
        self.buffer.record(record.clone());
        self.inner.publish(record).await
    }
}

#[cfg(test)]
#[path = "dlq_tests.rs"]
mod tests;
