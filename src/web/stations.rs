//! Station search endpoints.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};

use crate::query::{RawQuery, SearchKind};
use crate::state::AppState;
use crate::web::error::ApiError;

/// `POST /api/distances-only`
pub(super) async fn distances_only(
    State(state): State<AppState>,
    body: Result<Json<RawQuery>, JsonRejection>,
) -> Result<Response, ApiError> {
    search(state, SearchKind::Distance, body).await
}

/// `POST /api/volume-based`
pub(super) async fn volume_based(
    State(state): State<AppState>,
    body: Result<Json<RawQuery>, JsonRejection>,
) -> Result<Response, ApiError> {
    search(state, SearchKind::Volume, body).await
}

async fn search(
    state: AppState,
    kind: SearchKind,
    body: Result<Json<RawQuery>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(raw) = body.map_err(|rejection| {
        tracing::debug!(%kind, error = %rejection, "rejected search body");
        ApiError::bad_request("Invalid origin")
    })?;

    let stations = state
        .search
        .search(kind, &raw)
        .await
        .map_err(|e| ApiError::from_search(kind, e))?;

    Ok(Json(stations.as_slice()).into_response())
}
