//! Search query normalization.
//!
//! Raw search requests carry arbitrary GPS coordinates, radii, budgets and
//! efficiencies. Normalization snaps them onto a small canonical space so that
//! nearby, equivalent requests share one cache key.

mod normalize;

pub use normalize::{
    CacheKey, DEFAULT_FUEL_TYPE, DEFAULT_GRID_PRECISION, DEFAULT_RADIUS_BUCKETS, DEFAULT_RADIUS_KM,
    NormalizeOptions, NormalizedQuery, bucket_radius, cache_key_for, normalize, normalize_with,
    snap_to_grid,
};

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// `"lat,lng"`, the form upstream providers expect in query strings.
    pub fn to_param(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

/// Which search endpoint a request came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    /// Stations with price, distance and duration.
    Distance,
    /// As `Distance`, plus the fuel volume a budget buys after travel cost.
    Volume,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Distance => "distance",
            Self::Volume => "volume",
        }
    }
}

impl std::fmt::Display for SearchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A search request as received from a caller, before any validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuery {
    pub origin: LatLng,
    /// Requested search radius in kilometres.
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default)]
    pub budget: Option<f64>,
    /// Vehicle consumption in L/100km.
    #[serde(default)]
    pub efficiency: Option<f64>,
    #[serde(default)]
    pub fuel_type: Option<String>,
}
