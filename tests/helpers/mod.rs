//! In-memory places provider and builders for pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use gasfinder::places::{
    DistanceElement, FuelPrice, Money, NearbyPage, NearbyStation, PlaceDetails, PlacesProvider,
    ProviderError,
};
use gasfinder::pricing::{PricingResolver, ResolverConfig};
use gasfinder::query::{LatLng, RawQuery};
use gasfinder::search::StationSearch;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ORIGIN: LatLng = LatLng {
    lat: 45.5123456,
    lng: -73.5678901,
};

/// A station `index` thousandths of a degree north of the origin.
pub fn make_station(index: usize) -> NearbyStation {
    NearbyStation {
        place_id: format!("place-{index}"),
        name: format!("Station {index}"),
        vicinity: Some(format!("{index} Main St")),
        location: LatLng::new(ORIGIN.lat + 0.001 * (index as f64 + 1.0), ORIGIN.lng),
    }
}

pub fn make_stations(count: usize) -> Vec<NearbyStation> {
    (0..count).map(make_station).collect()
}

pub fn make_price(grade: &str, units: i64, nanos: i64) -> FuelPrice {
    FuelPrice {
        fuel_type: grade.to_owned(),
        price: Some(Money {
            units: Some(units),
            nanos: Some(nanos),
        }),
    }
}

pub fn make_query(lat: f64, lng: f64) -> RawQuery {
    RawQuery {
        origin: LatLng::new(lat, lng),
        radius: Some(5.0),
        budget: None,
        efficiency: None,
        fuel_type: Some("Regular".to_owned()),
    }
}

/// Resolver pacing shrunk so tests don't wait on provider delays.
pub fn fast_config() -> ResolverConfig {
    ResolverConfig {
        page_delay: Duration::from_millis(1),
        chunk_delay: Duration::ZERO,
        ..ResolverConfig::default()
    }
}

pub fn make_search(provider: &Arc<FakeProvider>) -> StationSearch {
    StationSearch::new(PricingResolver::new(provider.clone(), fast_config()))
}

/// Scripted provider that counts every call.
///
/// Every station sells `REGULAR_UNLEADED` at 1.459 unless overridden, and
/// distances are derived from latitude difference.
#[derive(Default)]
pub struct FakeProvider {
    first_page: Vec<NearbyStation>,
    second_page: Option<Vec<NearbyStation>>,
    prices: HashMap<String, Vec<FuelPrice>>,
    failing_details: HashSet<String>,
    failing_distance_chunks: HashSet<usize>,
    short_distance_chunks: HashSet<usize>,
    fail_second_page: bool,
    latency: Duration,

    pub fail_discovery: AtomicBool,
    pub discovery_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub distance_calls: AtomicUsize,
    pub distance_batches: Mutex<Vec<usize>>,
}

impl FakeProvider {
    pub fn new(stations: Vec<NearbyStation>) -> Self {
        Self {
            first_page: stations,
            ..Self::default()
        }
    }

    pub fn with_second_page(mut self, stations: Vec<NearbyStation>) -> Self {
        self.second_page = Some(stations);
        self
    }

    pub fn with_failing_second_page(mut self) -> Self {
        self.fail_second_page = true;
        self
    }

    pub fn with_prices(mut self, place_id: &str, prices: Vec<FuelPrice>) -> Self {
        self.prices.insert(place_id.to_owned(), prices);
        self
    }

    pub fn with_failing_details(mut self, place_id: &str) -> Self {
        self.failing_details.insert(place_id.to_owned());
        self
    }

    pub fn with_failing_distance_chunk(mut self, chunk: usize) -> Self {
        self.failing_distance_chunks.insert(chunk);
        self
    }

    /// Return one element fewer than requested for `chunk`.
    pub fn with_short_distance_chunk(mut self, chunk: usize) -> Self {
        self.short_distance_chunks.insert(chunk);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn discovery_calls(&self) -> usize {
        self.discovery_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn distance_batches(&self) -> Vec<usize> {
        self.distance_batches.lock().unwrap().clone()
    }

    fn upstream_error(what: &str) -> ProviderError {
        ProviderError::InvalidResponse(format!("scripted {what} failure"))
    }
}

#[async_trait]
impl PlacesProvider for FakeProvider {
    async fn nearby_stations(
        &self,
        _origin: LatLng,
        _radius_meters: f64,
        page_token: Option<&str>,
    ) -> Result<NearbyPage, ProviderError> {
        self.discovery_calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_discovery.load(Ordering::SeqCst) {
            return Err(Self::upstream_error("discovery"));
        }

        match page_token {
            None => Ok(NearbyPage {
                stations: self.first_page.clone(),
                next_page_token: self.second_page.as_ref().map(|_| "page-2".to_owned()),
            }),
            Some(_) if self.fail_second_page => Err(Self::upstream_error("pagination")),
            Some(_) => Ok(NearbyPage {
                stations: self.second_page.clone().unwrap_or_default(),
                next_page_token: None,
            }),
        }
    }

    async fn place_details(&self, place_id: &str) -> Result<PlaceDetails, ProviderError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_details.contains(place_id) {
            return Err(Self::upstream_error("details"));
        }

        let fuel_prices = self
            .prices
            .get(place_id)
            .cloned()
            .unwrap_or_else(|| vec![make_price("REGULAR_UNLEADED", 1, 459_000_000)]);
        Ok(PlaceDetails {
            display_name: None,
            formatted_address: None,
            fuel_prices,
        })
    }

    async fn distance_matrix(
        &self,
        origin: LatLng,
        destinations: &[LatLng],
    ) -> Result<Vec<Option<DistanceElement>>, ProviderError> {
        let chunk = self.distance_calls.fetch_add(1, Ordering::SeqCst);
        self.distance_batches
            .lock()
            .unwrap()
            .push(destinations.len());
        if self.failing_distance_chunks.contains(&chunk) {
            return Err(Self::upstream_error("distance"));
        }

        let mut elements: Vec<Option<DistanceElement>> = destinations
            .iter()
            .map(|dest| {
                let meters = ((dest.lat - origin.lat).abs() * 111_000.0).round() as u64;
                Some(DistanceElement {
                    distance_meters: Some(meters),
                    distance_text: Some(format!("{:.1} km", meters as f64 / 1000.0)),
                    duration_text: Some("5 mins".to_owned()),
                })
            })
            .collect();
        if self.short_distance_chunks.contains(&chunk) {
            elements.pop();
        }
        Ok(elements)
    }
}
