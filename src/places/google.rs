//! Google Places / Distance Matrix client.
//!
//! Discovery uses the legacy Nearby Search endpoint (it supports page tokens),
//! fuel prices come from Places API v1 `fuelOptions`, and distances from the
//! Distance Matrix API. Responses are read as loose JSON and mapped onto the
//! provider-neutral types, tolerating missing optional fields.

use super::{
    DistanceElement, FuelPrice, Money, NearbyPage, NearbyStation, PlaceDetails, PlacesProvider,
    ProviderError,
};
use crate::query::LatLng;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::trace;
use url::Url;

const NEARBY_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";
const PLACE_DETAILS_URL: &str = "https://places.googleapis.com/v1/places";
const DISTANCE_MATRIX_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

const DETAIL_FIELDS: &str = "displayName,formattedAddress,fuelOptions";

/// Nearby Search statuses that carry a usable (possibly empty) result list.
const USABLE_SEARCH_STATUSES: [&str; 2] = ["OK", "ZERO_RESULTS"];

pub struct GooglePlacesClient {
    http: reqwest::Client,
    api_key: String,
}

impl GooglePlacesClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
        })
    }

    fn url(&self, base: &str, params: &[(&str, &str)]) -> Result<Url, ProviderError> {
        Url::parse_with_params(
            base,
            params
                .iter()
                .copied()
                .chain(std::iter::once(("key", self.api_key.as_str()))),
        )
        .map_err(|e| ProviderError::InvalidResponse(format!("bad request url: {e}")))
    }

    /// Details URL with `place_id` as a single escaped path segment.
    fn place_details_url(&self, place_id: &str) -> Result<Url, ProviderError> {
        let mut url = self.url(PLACE_DETAILS_URL, &[("fields", DETAIL_FIELDS)])?;
        url.path_segments_mut()
            .map_err(|()| ProviderError::InvalidResponse("details url has no path".to_owned()))?
            .pop_if_empty()
            .push(place_id);
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<Value, ProviderError> {
        let resp = self.http.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl PlacesProvider for GooglePlacesClient {
    async fn nearby_stations(
        &self,
        origin: LatLng,
        radius_meters: f64,
        page_token: Option<&str>,
    ) -> Result<NearbyPage, ProviderError> {
        let location = origin.to_param();
        let radius = radius_meters.to_string();
        let mut params = vec![
            ("location", location.as_str()),
            ("radius", radius.as_str()),
            ("type", "gas_station"),
        ];
        if let Some(token) = page_token {
            params.push(("pagetoken", token));
        }

        let json = self.get_json(self.url(NEARBY_SEARCH_URL, &params)?).await?;
        let page = parse_nearby_page(&json)?;
        trace!(
            stations = page.stations.len(),
            has_more = page.next_page_token.is_some(),
            "nearby search page fetched"
        );
        Ok(page)
    }

    async fn place_details(&self, place_id: &str) -> Result<PlaceDetails, ProviderError> {
        let json = self.get_json(self.place_details_url(place_id)?).await?;
        Ok(parse_place_details(&json))
    }

    async fn distance_matrix(
        &self,
        origin: LatLng,
        destinations: &[LatLng],
    ) -> Result<Vec<Option<DistanceElement>>, ProviderError> {
        let origins = origin.to_param();
        let destinations = destinations
            .iter()
            .map(LatLng::to_param)
            .collect::<Vec<_>>()
            .join("|");

        let json = self
            .get_json(self.url(
                DISTANCE_MATRIX_URL,
                &[
                    ("origins", origins.as_str()),
                    ("destinations", destinations.as_str()),
                ],
            )?)
            .await?;
        Ok(parse_distance_row(&json))
    }
}

fn parse_nearby_page(json: &Value) -> Result<NearbyPage, ProviderError> {
    let status = json["status"].as_str().unwrap_or("OK");
    if !USABLE_SEARCH_STATUSES.contains(&status) {
        let message = json["error_message"].as_str().unwrap_or_default();
        return Err(ProviderError::InvalidResponse(format!(
            "nearby search status {status}: {message}"
        )));
    }

    let results = json["results"]
        .as_array()
        .ok_or_else(|| ProviderError::InvalidResponse("missing results".into()))?;

    let stations = results
        .iter()
        .filter_map(|r| {
            let location = &r["geometry"]["location"];
            Some(NearbyStation {
                place_id: r["place_id"].as_str()?.to_string(),
                name: r["name"].as_str().unwrap_or_default().to_string(),
                vicinity: r["vicinity"].as_str().map(str::to_string),
                location: LatLng::new(location["lat"].as_f64()?, location["lng"].as_f64()?),
            })
        })
        .collect();

    Ok(NearbyPage {
        stations,
        next_page_token: json["next_page_token"].as_str().map(str::to_string),
    })
}

/// Int64 fields arrive as JSON strings in Places API v1.
fn as_i64_lenient(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn parse_place_details(json: &Value) -> PlaceDetails {
    let fuel_prices = json["fuelOptions"]["fuelPrices"]
        .as_array()
        .map(|prices| {
            prices
                .iter()
                .filter_map(|p| {
                    let price = &p["price"];
                    Some(FuelPrice {
                        fuel_type: p["type"].as_str()?.to_string(),
                        price: price.is_object().then(|| Money {
                            units: as_i64_lenient(&price["units"]),
                            nanos: as_i64_lenient(&price["nanos"]),
                        }),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    PlaceDetails {
        display_name: json["displayName"]["text"].as_str().map(str::to_string),
        formatted_address: json["formattedAddress"].as_str().map(str::to_string),
        fuel_prices,
    }
}

fn parse_distance_row(json: &Value) -> Vec<Option<DistanceElement>> {
    let Some(elements) = json["rows"][0]["elements"].as_array() else {
        return Vec::new();
    };
    elements
        .iter()
        .map(|el| {
            if el["status"].as_str().is_some_and(|s| s != "OK") {
                return None;
            }
            Some(DistanceElement {
                distance_meters: el["distance"]["value"].as_u64(),
                distance_text: el["distance"]["text"].as_str().map(str::to_string),
                duration_text: el["duration"]["text"].as_str().map(str::to_string),
            })
        })
        .collect()
}
