//! Turns a normalized query into a priced, distance-annotated station list.
//!
//! Only the initial discovery call is fatal. Every secondary call (extra
//! discovery pages, per-station details, distance chunks) degrades to partial
//! data for the stations it covers, so a flaky upstream still yields a usable
//! result.

use super::cost::effective_fuel_volume;
use super::fuel::FuelPolicy;
use crate::places::{
    DISTANCE_MATRIX_MAX_DESTINATIONS, DistanceElement, NearbyStation, PlacesProvider,
    ProviderError,
};
use crate::query::{LatLng, NormalizedQuery};
use crate::utils::{fmt_duration, log_if_slow};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

const DISTANCE_UNAVAILABLE: &str = "Distance unavailable";
const DURATION_UNAVAILABLE: &str = "Duration unavailable";

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("failed to fetch nearby stations")]
    Discovery(#[source] ProviderError),
}

/// A priced station with its distance from the query origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationResult {
    pub place_id: String,
    pub station_name: String,
    pub address: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub price: f64,
    /// Provider grade the price was taken from.
    pub price_fuel_type: String,
    /// Driving distance in metres.
    pub distance: Option<u64>,
    pub distance_text: String,
    pub duration_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuel_volume: Option<f64>,
}

/// Upstream pacing and fallback settings.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Discovery pages fetched beyond the first.
    pub max_extra_pages: usize,
    /// Extra pages are only fetched for radii strictly above this (km).
    pub paginate_above_radius_km: f64,
    /// Wait before requesting a page token; the provider rejects fresh tokens.
    pub page_delay: Duration,
    pub detail_concurrency: usize,
    pub distance_chunk_size: usize,
    pub chunk_delay: Duration,
    pub fuel_policy: FuelPolicy,
    pub slow_threshold: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_extra_pages: 1,
            paginate_above_radius_km: 5.0,
            page_delay: Duration::from_secs(2),
            detail_concurrency: 10,
            distance_chunk_size: DISTANCE_MATRIX_MAX_DESTINATIONS,
            chunk_delay: Duration::from_millis(100),
            fuel_policy: FuelPolicy::default(),
            slow_threshold: Duration::from_secs(5),
        }
    }
}

/// A station that survived price lookup, awaiting its distance.
struct PricedStation {
    place_id: String,
    station_name: String,
    address: Option<String>,
    location: LatLng,
    price: f64,
    price_fuel_type: String,
}

#[derive(Clone)]
pub struct PricingResolver {
    provider: Arc<dyn PlacesProvider>,
    config: Arc<ResolverConfig>,
}

impl PricingResolver {
    pub fn new(provider: Arc<dyn PlacesProvider>, config: ResolverConfig) -> Self {
        Self {
            provider,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Discover, price and measure stations for `query`.
    pub async fn resolve(
        &self,
        query: &NormalizedQuery,
    ) -> Result<Vec<StationResult>, ResolveError> {
        let start = Instant::now();

        let nearby = self.discover(query).await?;
        let priced = self.price_stations(nearby, &query.fuel_type).await;
        let distances = self.measure(query.origin, &priced).await;

        let results: Vec<StationResult> = priced
            .into_iter()
            .zip(distances)
            .map(|(station, distance)| merge(station, distance, query))
            .collect();

        debug!(
            stations = results.len(),
            elapsed = fmt_duration(start.elapsed()),
            "stations resolved"
        );
        log_if_slow(start, self.config.slow_threshold, "station resolution");
        Ok(results)
    }

    async fn discover(&self, query: &NormalizedQuery) -> Result<Vec<NearbyStation>, ResolveError> {
        let radius_m = query.radius_meters();
        let first = self
            .provider
            .nearby_stations(query.origin, radius_m, None)
            .await
            .map_err(|e| {
                error!(error = %e, "nearby station discovery failed");
                ResolveError::Discovery(e)
            })?;

        let mut stations = first.stations;
        let mut token = first.next_page_token;
        let mut extra_pages = 0;

        while let Some(page_token) = token.take() {
            if query.radius <= self.config.paginate_above_radius_km
                || extra_pages >= self.config.max_extra_pages
            {
                break;
            }
            tokio::time::sleep(self.config.page_delay).await;
            extra_pages += 1;

            match self
                .provider
                .nearby_stations(query.origin, radius_m, Some(&page_token))
                .await
            {
                Ok(page) => {
                    stations.extend(page.stations);
                    token = page.next_page_token;
                }
                Err(e) => {
                    warn!(error = %e, page = extra_pages, "failed to fetch next discovery page");
                }
            }
        }

        Ok(stations)
    }

    /// Look up prices, dropping stations without an acceptable grade.
    /// Preserves discovery order.
    async fn price_stations(
        &self,
        nearby: Vec<NearbyStation>,
        fuel_type: &str,
    ) -> Vec<PricedStation> {
        futures::stream::iter(nearby)
            .map(|station| self.price_station(station, fuel_type))
            .buffered(self.config.detail_concurrency.max(1))
            .filter_map(|priced| async move { priced })
            .collect()
            .await
    }

    async fn price_station(
        &self,
        station: NearbyStation,
        fuel_type: &str,
    ) -> Option<PricedStation> {
        let details = match self.provider.place_details(&station.place_id).await {
            Ok(details) => details,
            Err(e) => {
                warn!(place_id = %station.place_id, error = %e, "failed to fetch station details");
                return None;
            }
        };

        let (grade, price) = self
            .config
            .fuel_policy
            .best_price(&details.fuel_prices, fuel_type)?;
        let price_fuel_type = grade.to_owned();

        Some(PricedStation {
            place_id: station.place_id,
            station_name: details.display_name.unwrap_or(station.name),
            address: details.formatted_address.or(station.vicinity),
            location: station.location,
            price,
            price_fuel_type,
        })
    }

    /// One entry per station, in station order. Chunks that fail come back
    /// as `None` for every station they cover.
    async fn measure(
        &self,
        origin: LatLng,
        stations: &[PricedStation],
    ) -> Vec<Option<DistanceElement>> {
        let chunk_size = self
            .config
            .distance_chunk_size
            .clamp(1, DISTANCE_MATRIX_MAX_DESTINATIONS);
        let mut distances = Vec::with_capacity(stations.len());

        for (i, chunk) in stations.chunks(chunk_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.chunk_delay).await;
            }
            let destinations: Vec<LatLng> = chunk.iter().map(|s| s.location).collect();

            let mut elements = match self.provider.distance_matrix(origin, &destinations).await {
                Ok(elements) => elements,
                Err(e) => {
                    warn!(
                        chunk = i,
                        destinations = chunk.len(),
                        error = %e,
                        "distance lookup failed"
                    );
                    Vec::new()
                }
            };
            if elements.len() != chunk.len() {
                debug!(
                    chunk = i,
                    expected = chunk.len(),
                    received = elements.len(),
                    "distance count mismatch, padding"
                );
            }
            elements.resize(chunk.len(), None);
            distances.extend(elements);
        }

        distances
    }
}

fn merge(
    station: PricedStation,
    distance: Option<DistanceElement>,
    query: &NormalizedQuery,
) -> StationResult {
    let distance = distance.unwrap_or_default();
    let distance_km = distance.distance_meters.unwrap_or(0) as f64 / 1000.0;

    let trip = match (query.budget, query.efficiency) {
        (Some(budget), Some(efficiency)) => Some(effective_fuel_volume(
            station.price,
            distance_km,
            budget,
            efficiency,
        )),
        _ => None,
    };

    StationResult {
        place_id: station.place_id,
        station_name: station.station_name,
        address: station.address,
        lat: station.location.lat,
        lng: station.location.lng,
        price: station.price,
        price_fuel_type: station.price_fuel_type,
        distance: distance.distance_meters,
        distance_text: distance
            .distance_text
            .unwrap_or_else(|| DISTANCE_UNAVAILABLE.to_owned()),
        duration_text: distance
            .duration_text
            .unwrap_or_else(|| DURATION_UNAVAILABLE.to_owned()),
        travel_cost: trip.map(|t| t.travel_cost),
        effective_budget: trip.map(|t| t.effective_budget),
        fuel_volume: trip.map(|t| t.fuel_volume),
    }
}
