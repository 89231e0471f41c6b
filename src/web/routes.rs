//! Web API router construction.

use axum::{
    Router,
    routing::{get, post},
};

use std::time::Duration;

use crate::state::AppState;
use crate::web::middleware::rate_limit::SearchRateLimitLayer;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{stations, status};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer};

/// Upper bound on a whole request, provider pacing included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let search_router = Router::new()
        .route("/distances-only", post(stations::distances_only))
        .route("/volume-based", post(stations::volume_based))
        .route_layer(SearchRateLimitLayer::new(app_state.search_limit.clone()));

    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/metrics", get(status::metrics))
        .route("/metrics/reset", post(status::reset_metrics))
        .merge(search_router)
        .with_state(app_state);

    Router::new().nest("/api", api_router).layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        CorsLayer::permissive(),
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::new(REQUEST_TIMEOUT),
    ))
}
