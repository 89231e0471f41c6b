//! Grid snapping, radius bucketing and cache key derivation.
//!
//! Everything here is pure: the same input always yields the same
//! `NormalizedQuery`, and equal `NormalizedQuery` values always yield the same
//! `CacheKey`. The cache store and the request collapser both rely on that.

use super::{LatLng, RawQuery};
use crate::utils::truncate_str;
use serde::Serialize;
use std::fmt;

/// Grid resolution in degrees (~110m of latitude).
pub const DEFAULT_GRID_PRECISION: f64 = 0.001;

/// Ascending radius buckets in kilometres.
pub const DEFAULT_RADIUS_BUCKETS: [f64; 4] = [5.0, 10.0, 20.0, 50.0];

/// Radius used when the request does not specify one.
pub const DEFAULT_RADIUS_KM: f64 = 5.0;

pub const DEFAULT_FUEL_TYPE: &str = "Regular";

const KEY_DELIMITER: char = '|';

/// Tunables for normalization. `Default` reproduces the production constants.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    pub grid_precision: f64,
    /// Must be non-empty and ascending.
    pub radius_buckets: Vec<f64>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            grid_precision: DEFAULT_GRID_PRECISION,
            radius_buckets: DEFAULT_RADIUS_BUCKETS.to_vec(),
        }
    }
}

/// The canonical, reduced-precision form of a [`RawQuery`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedQuery {
    pub origin: LatLng,
    pub radius: f64,
    pub budget: Option<f64>,
    pub efficiency: Option<f64>,
    pub fuel_type: String,
}

impl NormalizedQuery {
    /// Search radius in metres, as the places provider expects it.
    pub fn radius_meters(&self) -> f64 {
        self.radius * 1000.0
    }
}

/// Deterministic string identifying a normalized equivalence class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key prefix suitable for log lines.
    pub fn short(&self) -> &str {
        truncate_str(&self.0, 50)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Snap a coordinate onto a grid with the given spacing in degrees.
///
/// Rounds half away from zero, so the grid is symmetric around the equator
/// and the prime meridian. Dividing by the number of cells per degree (rather
/// than multiplying by the precision) keeps results like `45.512` exact, which
/// makes snapping idempotent and keeps cache keys readable.
pub fn snap_to_grid(value: f64, precision: f64) -> f64 {
    let cells_per_degree = 1.0 / precision;
    // `+ 0.0` folds -0.0 into 0.0 so both render as "0" in keys.
    (value * cells_per_degree).round() / cells_per_degree + 0.0
}

/// Pick the bucket closest to `radius`. Exact ties go to the smaller bucket.
pub fn bucket_radius(radius: f64, buckets: &[f64]) -> f64 {
    let mut best = match buckets.first() {
        Some(&first) => first,
        None => return radius,
    };
    for &candidate in &buckets[1..] {
        if (candidate - radius).abs() < (best - radius).abs() {
            best = candidate;
        }
    }
    best
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor + 0.0
}

/// Normalize with the production defaults.
pub fn normalize(raw: &RawQuery) -> NormalizedQuery {
    normalize_with(raw, &NormalizeOptions::default())
}

/// Normalize a raw query.
///
/// Total over structurally valid input: extreme radii or zero budgets are
/// normalized, not rejected. Callers validate origins beforehand.
pub fn normalize_with(raw: &RawQuery, options: &NormalizeOptions) -> NormalizedQuery {
    let origin = LatLng {
        lat: snap_to_grid(raw.origin.lat, options.grid_precision),
        lng: snap_to_grid(raw.origin.lng, options.grid_precision),
    };
    let radius = bucket_radius(
        raw.radius.unwrap_or(DEFAULT_RADIUS_KM),
        &options.radius_buckets,
    );
    let fuel_type = match raw.fuel_type.as_deref() {
        Some(ft) if !ft.is_empty() => ft.to_owned(),
        _ => DEFAULT_FUEL_TYPE.to_owned(),
    };

    NormalizedQuery {
        origin,
        radius,
        budget: raw.budget.map(|b| round_to(b, 2)),
        efficiency: raw.efficiency.map(|e| round_to(e, 1)),
        fuel_type,
    }
}

/// Derive the cache key: `lat:…|lng:…|r:…[|b:…][|e:…]|ft:…`.
pub fn cache_key_for(query: &NormalizedQuery) -> CacheKey {
    let mut parts = vec![
        format!("lat:{}", query.origin.lat),
        format!("lng:{}", query.origin.lng),
        format!("r:{}", query.radius),
    ];
    if let Some(budget) = query.budget {
        parts.push(format!("b:{budget}"));
    }
    if let Some(efficiency) = query.efficiency {
        parts.push(format!("e:{efficiency}"));
    }
    parts.push(format!("ft:{}", query.fuel_type));

    CacheKey(parts.join(&KEY_DELIMITER.to_string()))
}
