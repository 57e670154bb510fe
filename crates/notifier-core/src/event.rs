//! Domain types for webhook events flowing through the pipeline.
//!
//! Three wire formats live here:
//! - [`WebhookEvent`]: the log message consumed from the webhook-event topic
//! - [`EventPayload`]: the resolved, type-specific payload POSTed to
//!   destination URLs
//! - [`DeadLetterRecord`]: the record published to the dead-letter topic when
//!   delivery is exhausted
//!
//! All three serialize as snake_case JSON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// WebhookEvent
// ============================================================================

/// A webhook event as consumed from the event log.
///
/// `event_id` is globally unique and keys deduplication, `account_id` keys
/// rate limiting, and `event_type` selects the provider that resolves the
/// destination URL and payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event_id: String,
    pub event_type: String,
    pub account_id: String,
}

impl WebhookEvent {
    /// Create a new webhook event.
    pub fn new(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            account_id: account_id.into(),
        }
    }

    /// Decode an event from raw log-message bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the bytes are not valid `WebhookEvent`
    /// JSON. Callers drop malformed messages and continue with the batch.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Check that all identifying fields are present.
    ///
    /// Used by the admission API to reject incomplete submissions before
    /// they reach the log.
    pub fn is_complete(&self) -> bool {
        !self.event_id.is_empty() && !self.event_type.is_empty() && !self.account_id.is_empty()
    }
}

/// Error returned when log-message bytes are not valid event JSON.
#[derive(Debug, Error)]
#[error("invalid webhook event JSON: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

// ============================================================================
// Resolved Payloads
// ============================================================================

/// A subscriber referenced by a subscriber event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,
    pub email: String,
    pub name: String,
    pub account_id: String,
}

/// Payload delivered for `subscriber` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberEvent {
    pub event_name: String,
    /// RFC3339 timestamp of the originating event.
    pub event_time: String,
    pub subscriber: Subscriber,
    pub webhook_id: String,
}

/// The resolved payload POSTed to a destination URL.
///
/// One variant per event type; serialization is untagged so each variant
/// keeps its own JSON schema on the wire. Providers construct the variant
/// matching the event type they support, and everything downstream handles
/// payloads uniformly through this enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Subscriber(SubscriberEvent),
}

// ============================================================================
// DeadLetterRecord
// ============================================================================

/// Record published to the dead-letter topic when delivery is exhausted.
///
/// Carries enough of the original event to reconstruct it for replay, plus
/// the last observed delivery error and a human-readable failure reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub event_id: String,
    pub account_id: String,
    pub event_type: String,
    pub last_error_message: String,
    pub failure_reason: String,
}

impl DeadLetterRecord {
    /// Build a dead-letter record from the event that failed delivery.
    pub fn from_event(
        event: &WebhookEvent,
        last_error_message: impl Into<String>,
        failure_reason: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event.event_id.clone(),
            account_id: event.account_id.clone(),
            event_type: event.event_type.clone(),
            last_error_message: last_error_message.into(),
            failure_reason: failure_reason.into(),
        }
    }

    /// Reconstruct the original webhook event for replay.
    pub fn to_event(&self) -> WebhookEvent {
        WebhookEvent::new(
            self.event_id.clone(),
            self.event_type.clone(),
            self.account_id.clone(),
        )
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
