//! Event providers backed by the subscription data source.
//!
//! A provider owns one event type and resolves destination URLs and
//! payloads in bulk for the batch pipeline.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use notifier_core::provider::{EventProvider, ProviderError};
use notifier_core::{EventPayload, Subscriber, SubscriberEvent};
use std::collections::HashMap;
use tracing::debug;

/// Event type handled by [`SubscriberEventProvider`].
pub const SUBSCRIBER_EVENT_TYPE: &str = "subscriber";

/// Provider for `subscriber` events.
///
/// Stands in for the subscription database: URL and payload lookups here
/// derive deterministic records from the event IDs. Swapping in a real data
/// source only changes the two lookup bodies; the bulk contract and the
/// payload shape stay as they are.
pub struct SubscriberEventProvider {
    base_url: String,
}

impl SubscriberEventProvider {
    /// Provider resolving URLs under the default endpoint base.
    pub fn new() -> Self {
        Self::with_base_url("https://example.com")
    }

    /// Provider resolving URLs under the given base. Used by tests to point
    /// at a mock endpoint.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for SubscriberEventProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventProvider for SubscriberEventProvider {
    fn supports(&self, event_type: &str) -> bool {
        event_type == SUBSCRIBER_EVENT_TYPE
    }

    async fn webhook_urls(
        &self,
        event_ids: &[String],
    ) -> Result<HashMap<String, String>, ProviderError> {
        debug!(count = event_ids.len(), "resolving subscriber webhook URLs");
        Ok(event_ids
            .iter()
            .map(|id| (id.clone(), format!("{}/webhooks/{}", self.base_url, id)))
            .collect())
    }

    async fn payloads(
        &self,
        event_ids: &[String],
    ) -> Result<HashMap<String, EventPayload>, ProviderError> {
        debug!(count = event_ids.len(), "resolving subscriber payloads");
        let event_time = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        Ok(event_ids
            .iter()
            .map(|id| {
                let payload = EventPayload::Subscriber(SubscriberEvent {
                    event_name: "subscriber.created".to_string(),
                    event_time: event_time.clone(),
                    subscriber: Subscriber {
                        id: format!("sub-{id}"),
                        email: format!("user-{id}@example.com"),
                        name: format!("User {id}"),
                        account_id: "account-123".to_string(),
                    },
                    webhook_id: format!("wh-{id}"),
                });
                (id.clone(), payload)
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "providers_tests.rs"]
mod tests;
