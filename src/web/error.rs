//! JSON error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::query::SearchKind;
use crate::search::SearchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    InvalidRequest,
    RateLimited,
    UpstreamFailure,
    InternalError,
}

impl ApiErrorCode {
    fn status(self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamFailure | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(rename = "error")]
    pub message: String,
    pub code: ApiErrorCode,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InvalidRequest, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InternalError, message)
    }

    /// Map a failed search onto the response for its endpoint. Upstream
    /// details are logged, not returned.
    pub fn from_search(kind: SearchKind, err: SearchError) -> Self {
        match err {
            SearchError::Invalid(e) => Self::bad_request(e.to_string()),
            SearchError::Resolve(e) => {
                tracing::error!(%kind, error = %e, "search failed");
                let message = match kind {
                    SearchKind::Distance => "Failed to fetch station data",
                    SearchKind::Volume => "Failed to calculate volume-based data",
                };
                Self::new(ApiErrorCode::UpstreamFailure, message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}
