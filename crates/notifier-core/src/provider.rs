//! Provider registry for type-keyed URL and payload resolution.
//!
//! Each [`EventProvider`] owns one event type and resolves destination URLs
//! and payloads for batches of event IDs in bulk — one lookup per group, not
//! per event. The [`ProviderRegistry`] is built once at startup and used
//! read-only while processing.

use crate::event::EventPayload;
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;

// ============================================================================
// EventProvider
// ============================================================================

/// Lookup strategy for one event type.
///
/// Both lookups are bulk by design: the pipeline collects the admitted event
/// IDs of a group and issues exactly one `webhook_urls` and one `payloads`
/// call. Per-event lookups against the backing source are a performance
/// anti-pattern and deliberately unsupported.
///
/// An event ID absent from a returned map (or mapped to an empty URL) means
/// "no subscription" — the pipeline drops that event without delivery or
/// dead-lettering.
#[async_trait]
pub trait EventProvider: Send + Sync {
    /// Check whether this provider handles the given event type.
    fn supports(&self, event_type: &str) -> bool;

    /// Resolve destination URLs for a batch of event IDs.
    async fn webhook_urls(
        &self,
        event_ids: &[String],
    ) -> Result<HashMap<String, String>, ProviderError>;

    /// Resolve delivery payloads for a batch of event IDs.
    async fn payloads(
        &self,
        event_ids: &[String],
    ) -> Result<HashMap<String, EventPayload>, ProviderError>;
}

/// Error from a provider lookup.
///
/// Lookup errors are systemic (backing source down, query failure) and abort
/// the whole group without dead-lettering; they surface through logs and
/// metrics rather than amplifying into DLQ floods.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backing lookup source failed.
    #[error("provider lookup failed: {message}")]
    Lookup { message: String },
}

// ============================================================================
// ProviderRegistry
// ============================================================================

/// Registry resolving event types to their providers.
///
/// Built once at service startup. Resolution returns the first registered
/// provider that supports the type; event types without a provider cause
/// their group to be dropped with a warning.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn EventProvider>>,
}

impl ProviderRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Register a provider. Returns `&mut Self` to allow method chaining.
    pub fn register(&mut self, provider: Arc<dyn EventProvider>) -> &mut Self {
        self.providers.push(provider);
        self
    }

    /// Resolve the provider for an event type.
    ///
    /// Returns `None` if no registered provider supports the type.
    pub fn resolve(&self, event_type: &str) -> Option<Arc<dyn EventProvider>> {
        self.providers
            .iter()
            .find(|p| p.supports(event_type))
            .cloned()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
