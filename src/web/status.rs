//! Health and metrics handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, trace};

use crate::cache::CacheStats;
use crate::metrics::MetricsSnapshot;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub snapshot: MetricsSnapshot,
    pub cache_stats: CacheStats,
    pub in_flight: usize,
}

/// Health check endpoint
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("GIT_COMMIT_SHORT"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Normalization and cache counters
pub(super) async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        snapshot: state.metrics().snapshot(),
        cache_stats: state.cache_stats(),
        in_flight: state.search.in_flight(),
    })
}

/// Zero the counters. Cached results are left alone.
pub(super) async fn reset_metrics(State(state): State<AppState>) -> Json<Value> {
    state.metrics().reset();
    info!("metrics reset");
    Json(json!({ "message": "Metrics reset" }))
}
