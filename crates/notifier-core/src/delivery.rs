//! HTTP webhook delivery client.
//!
//! Sends a single JSON POST to a destination URL and classifies the outcome.
//! Any HTTP status in `[200, 300)` is success; everything else — non-2xx
//! statuses and transport failures alike — is a retryable [`DeliveryError`]
//! for the retry executor above this layer.

use crate::event::EventPayload;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default total request timeout for a single delivery attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// DeliveryError
// ============================================================================

/// A failed delivery attempt.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The endpoint answered with a non-2xx status.
    #[error("webhook endpoint returned status {status}")]
    Status { status: u16 },

    /// The request failed below HTTP (connect, TLS, timeout).
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The payload could not be serialized to JSON.
    #[error("failed to serialize webhook payload: {0}")]
    Serialize(#[source] serde_json::Error),
}

// ============================================================================
// WebhookClient
// ============================================================================

/// HTTP client for webhook delivery.
///
/// Wraps a pooled [`reqwest::Client`] with a total per-request timeout.
/// Cheap to clone; all clones share the connection pool.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    /// Create a client with the given total request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Transport`] when the underlying client
    /// cannot be constructed (TLS backend initialization).
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Deliver a payload to a destination URL.
    ///
    /// Serializes the payload as JSON and POSTs it with
    /// `Content-Type: application/json`. The configured timeout bounds the
    /// whole attempt; dropping the returned future aborts the in-flight
    /// request, which is how caller cancellation propagates here.
    pub async fn send(&self, url: &str, payload: &EventPayload) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(payload).map_err(DeliveryError::Serialize)?;

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(url = %url, status = status.as_u16(), "webhook delivered");
            Ok(())
        } else {
            debug!(url = %url, status = status.as_u16(), "webhook endpoint returned failure status");
            Err(DeliveryError::Status {
                status: status.as_u16(),
            })
        }
    }
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
