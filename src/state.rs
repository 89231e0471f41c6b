//! Application state shared across request handlers.

use crate::cache::CacheStats;
use crate::metrics::MetricsRecorder;
use crate::search::StationSearch;
use crate::web::middleware::rate_limit::{SearchRateLimiter, SharedSearchRateLimiter};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub search: StationSearch,
    pub search_limit: SharedSearchRateLimiter,
}

impl AppState {
    /// State with the default per-IP search limit.
    pub fn new(search: StationSearch) -> Self {
        Self {
            search,
            search_limit: Arc::new(SearchRateLimiter::default()),
        }
    }

    pub fn with_search_limit(mut self, limiter: SearchRateLimiter) -> Self {
        self.search_limit = Arc::new(limiter);
        self
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        self.search.metrics()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.search.cache_stats()
    }
}
