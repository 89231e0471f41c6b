//! The station search pipeline: normalize, check the cache, collapse
//! concurrent misses onto one resolution, populate the cache.

use crate::cache::{CacheStats, CacheStore, CollapseError, DEFAULT_TTL, RequestCollapser};
use crate::metrics::MetricsRecorder;
use crate::pricing::{PricingResolver, ResolveError, StationResult};
use crate::query::{
    CacheKey, NormalizeOptions, NormalizedQuery, RawQuery, SearchKind, cache_key_for,
    normalize_with,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A resolved station list, shared between the cache and every caller.
pub type Stations = Arc<Vec<StationResult>>;

/// A raw query that cannot be normalized.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid origin")]
    InvalidOrigin,
    #[error("Latitude must be between -90 and 90")]
    LatitudeOutOfRange,
    #[error("Longitude must be between -180 and 180")]
    LongitudeOutOfRange,
    #[error("Budget and efficiency are required")]
    MissingVolumeInputs,
    #[error("Budget must be a positive number")]
    InvalidBudget,
    #[error("Efficiency must be a positive number")]
    InvalidEfficiency,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("station resolution failed: {0}")]
    Resolve(#[from] CollapseError<ResolveError>),
}

/// Reject structurally invalid input before it reaches normalization.
pub fn validate(kind: SearchKind, raw: &RawQuery) -> Result<(), ValidationError> {
    let origin = raw.origin;
    if !origin.lat.is_finite() || !origin.lng.is_finite() {
        return Err(ValidationError::InvalidOrigin);
    }
    if !(-90.0..=90.0).contains(&origin.lat) {
        return Err(ValidationError::LatitudeOutOfRange);
    }
    if !(-180.0..=180.0).contains(&origin.lng) {
        return Err(ValidationError::LongitudeOutOfRange);
    }

    if kind == SearchKind::Volume {
        let (Some(budget), Some(efficiency)) = (raw.budget, raw.efficiency) else {
            return Err(ValidationError::MissingVolumeInputs);
        };
        if !budget.is_finite() || budget <= 0.0 {
            return Err(ValidationError::InvalidBudget);
        }
        if !efficiency.is_finite() || efficiency <= 0.0 {
            return Err(ValidationError::InvalidEfficiency);
        }
    }
    Ok(())
}

/// Owns one instance of every pipeline component. Clone-cheap; clones share
/// the cache, the in-flight map and the counters.
#[derive(Clone)]
pub struct StationSearch {
    options: Arc<NormalizeOptions>,
    cache: CacheStore<Stations>,
    collapser: RequestCollapser<Stations, ResolveError>,
    metrics: MetricsRecorder,
    resolver: PricingResolver,
    ttl: Duration,
}

impl StationSearch {
    pub fn new(resolver: PricingResolver) -> Self {
        Self {
            options: Arc::new(NormalizeOptions::default()),
            cache: CacheStore::new(),
            collapser: RequestCollapser::new(),
            metrics: MetricsRecorder::new(),
            resolver,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_options(mut self, options: NormalizeOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn cache(&self) -> &CacheStore<Stations> {
        &self.cache
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn in_flight(&self) -> usize {
        self.collapser.in_flight()
    }

    /// Normalize `raw` and derive its cache key.
    pub fn key_for(&self, raw: &RawQuery) -> (NormalizedQuery, CacheKey) {
        let query = normalize_with(raw, &self.options);
        let key = cache_key_for(&query);
        (query, key)
    }

    /// Validate, normalize and answer a search.
    ///
    /// Fresh cached results are returned without touching the provider.
    /// Concurrent misses for one key share a single resolution, and only a
    /// successful resolution is cached.
    pub async fn search(&self, kind: SearchKind, raw: &RawQuery) -> Result<Stations, SearchError> {
        validate(kind, raw)?;
        self.metrics.record_api_call(kind);

        let (query, key) = self.key_for(raw);
        self.metrics.record_normalized_request(&key);
        debug!(%kind, key = key.short(), "normalized search");

        if let Some(stations) = self.cache.get(&key) {
            return Ok(stations);
        }

        let resolver = self.resolver.clone();
        let cache = self.cache.clone();
        let ttl = self.ttl;
        let producer_key = key.clone();
        let stations = self
            .collapser
            .collapse(&key, move || async move {
                let stations = Arc::new(resolver.resolve(&query).await?);
                // Populated before the flight deregisters, so a caller arriving
                // just after settlement hits the cache instead of re-resolving.
                cache.set(&producer_key, Arc::clone(&stations), ttl);
                Ok(stations)
            })
            .await?;

        Ok(stations)
    }
}
