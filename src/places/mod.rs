//! The upstream places provider: station discovery, fuel prices and driving
//! distances.
//!
//! The resolver only sees the [`PlacesProvider`] trait and the
//! provider-neutral types below; [`google::GooglePlacesClient`] is the
//! production implementation.

pub mod errors;
pub mod google;

pub use errors::ProviderError;
pub use google::GooglePlacesClient;

use crate::query::LatLng;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A station returned by discovery, before price lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyStation {
    pub place_id: String,
    pub name: String,
    pub vicinity: Option<String>,
    pub location: LatLng,
}

/// One page of discovery results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NearbyPage {
    pub stations: Vec<NearbyStation>,
    /// Present when the provider has more results.
    pub next_page_token: Option<String>,
}

/// A monetary amount split into whole units and billionths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub units: Option<i64>,
    pub nanos: Option<i64>,
}

/// One fuel grade's posted price at a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelPrice {
    /// Provider fuel identifier, e.g. `REGULAR_UNLEADED`.
    pub fuel_type: String,
    pub price: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceDetails {
    pub display_name: Option<String>,
    pub formatted_address: Option<String>,
    pub fuel_prices: Vec<FuelPrice>,
}

/// Driving distance/duration from the origin to one destination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceElement {
    pub distance_meters: Option<u64>,
    pub distance_text: Option<String>,
    pub duration_text: Option<String>,
}

/// The external capability the pricing resolver consumes.
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    /// Discover gas stations within `radius_meters` of `origin`.
    ///
    /// `page_token` continues a previous discovery call.
    async fn nearby_stations(
        &self,
        origin: LatLng,
        radius_meters: f64,
        page_token: Option<&str>,
    ) -> Result<NearbyPage, ProviderError>;

    /// Fetch name, address and fuel prices for one station.
    async fn place_details(&self, place_id: &str) -> Result<PlaceDetails, ProviderError>;

    /// Distances from `origin` to each destination, in input order.
    ///
    /// Entries are `None` where the provider could not route. At most
    /// [`DISTANCE_MATRIX_MAX_DESTINATIONS`] destinations per call.
    async fn distance_matrix(
        &self,
        origin: LatLng,
        destinations: &[LatLng],
    ) -> Result<Vec<Option<DistanceElement>>, ProviderError>;
}

/// Per-call destination limit of the distance matrix endpoint.
pub const DISTANCE_MATRIX_MAX_DESTINATIONS: usize = 25;
