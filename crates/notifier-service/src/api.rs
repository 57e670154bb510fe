//! HTTP API for event admission, DLQ inspection/replay, health, and metrics.
//!
//! The admission endpoint validates and enqueues events onto the log; it
//! never reports downstream delivery outcomes synchronously — those surface
//! through metrics and the DLQ.

use crate::dlq::DlqBuffer;
use crate::producer::EventPublisher;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use notifier_core::WebhookEvent;
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

// ============================================================================
// Application State
// ============================================================================

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Producer for the webhook-event topic (admission and replay).
    pub producer: Arc<dyn EventPublisher>,

    /// Tail of recently dead-lettered records.
    pub dlq_buffer: Arc<DlqBuffer>,
}

/// Build the API router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/webhook/event", post(create_webhook_event))
        .route("/api/dlq/events", get(get_dlq_events))
        .route("/api/dlq/replay", post(replay_dlq_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Render the default Prometheus registry in text exposition format.
async fn metrics() -> Result<String, (StatusCode, String)> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Accept a webhook event and enqueue it onto the log.
async fn create_webhook_event(
    State(state): State<ApiState>,
    Json(event): Json<WebhookEvent>,
) -> (StatusCode, Json<Value>) {
    if !event.is_complete() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing required fields" })),
        );
    }

    match state.producer.publish(&event).await {
        Ok(()) => {
            info!(event_id = %event.event_id, "accepted webhook event");
            (
                StatusCode::ACCEPTED,
                Json(json!({
                    "message": "Event accepted for processing",
                    "event_id": event.event_id,
                })),
            )
        }
        Err(e) => {
            error!(event_id = %event.event_id, error = %e, "failed to enqueue webhook event");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to enqueue event" })),
            )
        }
    }
}

/// List the retained tail of dead-lettered records.
async fn get_dlq_events(State(state): State<ApiState>) -> Json<Value> {
    let events = state.dlq_buffer.snapshot();
    Json(json!({ "events": events }))
}

#[derive(Debug, Deserialize)]
struct ReplayRequest {
    event_ids: Vec<String>,
}

/// Re-inject dead-lettered events onto the webhook-event topic.
///
/// Only records still present in the retained tail can be replayed from
/// this endpoint. Replayed events re-enter the pipeline as ordinary
/// submissions; within the dedup window they will be suppressed as
/// duplicates, so replay is typically paired with operator-driven dedup
/// key removal.
async fn replay_dlq_events(
    State(state): State<ApiState>,
    Json(request): Json<ReplayRequest>,
) -> (StatusCode, Json<Value>) {
    if request.event_ids.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No event IDs provided" })),
        );
    }

    let records = state.dlq_buffer.take(&request.event_ids);
    let mut replayed = 0usize;
    for record in &records {
        match state.producer.publish(&record.to_event()).await {
            Ok(()) => replayed += 1,
            Err(e) => {
                error!(event_id = %record.event_id, error = %e, "failed to replay event");
                // Keep the record inspectable rather than losing it.
                state.dlq_buffer.record(record.clone());
            }
        }
    }

    info!(
        requested = request.event_ids.len(),
        replayed = replayed,
        "replayed DLQ events"
    );
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Events queued for replay",
            "count": replayed,
        })),
    )
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
