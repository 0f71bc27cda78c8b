use crate::models::{FeedEvent, SalesConfig, SalesState};
use crate::state::FeedState;
use crate::traffic;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use ticketsync_core::DEFAULT_QUANTITY;

// ============================================================================
// Health and metrics
// ============================================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn render_metrics(State(state): State<FeedState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::NOT_FOUND,
            "metrics recorder not installed".to_string(),
        ),
    }
}

// ============================================================================
// Snapshot endpoint
// ============================================================================

/// Every event served by the feed; the client reads the first element
pub async fn list_events(State(state): State<FeedState>) -> impl IntoResponse {
    Json(vec![state.event()])
}

// ============================================================================
// Sales endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSalesRequest {
    pub rate: Option<f64>,
    pub max_batch: Option<u32>,
    pub duration_secs: Option<u64>,
}

pub async fn start_sales(
    State(state): State<FeedState>,
    Json(req): Json<StartSalesRequest>,
) -> impl IntoResponse {
    let config = SalesConfig {
        rate: req.rate.unwrap_or(2.0),
        max_batch: req.max_batch.unwrap_or(state.config.max_batch),
        duration_secs: req.duration_secs,
    };

    if !(config.rate.is_finite() && config.rate > 0.0) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "rate must be a positive number" })),
        );
    }

    if !traffic::start_sales(&state, config) {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "Sales already running" })),
        );
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "started" })),
    )
}

pub async fn stop_sales(State(state): State<FeedState>) -> impl IntoResponse {
    if state.sales.stop() {
        state
            .event_bus
            .publish(FeedEvent::SalesStateChanged(SalesState::Stopped));
    }

    Json(serde_json::json!({ "status": "stopped" }))
}

pub async fn sales_status(State(state): State<FeedState>) -> impl IntoResponse {
    let event = state.event();
    Json(serde_json::json!({
        "state": state.sales.state(),
        "remaining": event.current_quantity,
        "totalQuota": event.total_quota,
        "pushConnections": state.push_connections.load(std::sync::atomic::Ordering::SeqCst),
    }))
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub quantity: Option<u32>,
}

pub async fn purchase(
    State(state): State<FeedState>,
    Json(req): Json<PurchaseRequest>,
) -> impl IntoResponse {
    let quantity = req.quantity.unwrap_or(DEFAULT_QUANTITY);
    if quantity == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "quantity must be at least 1" })),
        );
    }

    let remaining = state.sell(quantity);
    (
        StatusCode::OK,
        Json(serde_json::json!({ "remaining": remaining })),
    )
}

// ============================================================================
// Push control
// ============================================================================

pub async fn disconnect_push(State(state): State<FeedState>) -> impl IntoResponse {
    let closed = state.disconnect_push();
    Json(serde_json::json!({ "disconnected": closed }))
}
