//! HTTP-level tests of the API router.

mod helpers;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use gasfinder::state::AppState;
use gasfinder::web::create_router;
use gasfinder::web::middleware::rate_limit::SearchRateLimiter;
use helpers::{FakeProvider, ORIGIN, make_search, make_stations};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tower::ServiceExt;

fn app(provider: &Arc<FakeProvider>) -> axum::Router {
    create_router(AppState::new(make_search(provider)))
}

async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn origin_body() -> Value {
    json!({ "origin": { "lat": ORIGIN.lat, "lng": ORIGIN.lng }, "radius": 5 })
}

#[tokio::test]
async fn health_reports_healthy() {
    let router = app(&Arc::new(FakeProvider::default()));
    let (status, body) = send(&router, Request::get("/api/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn distances_only_returns_station_list() {
    let provider = Arc::new(FakeProvider::new(make_stations(2)));
    let router = app(&provider);

    let (status, body) = send(&router, post_json("/api/distances-only", origin_body())).await;

    assert_eq!(status, StatusCode::OK);
    let stations = body.as_array().unwrap();
    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0]["place_id"], "place-0");
    assert_eq!(stations[0]["price"], 1.459);
    assert!(stations[0].get("fuel_volume").is_none());
}

#[tokio::test]
async fn volume_based_requires_budget_and_efficiency() {
    let provider = Arc::new(FakeProvider::new(make_stations(1)));
    let router = app(&provider);

    let (status, body) = send(&router, post_json("/api/volume-based", origin_body())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
    assert_eq!(body["error"], "Budget and efficiency are required");
    assert_eq!(provider.discovery_calls(), 0);
}

#[tokio::test]
async fn volume_based_adds_fuel_volume() {
    let provider = Arc::new(FakeProvider::new(make_stations(1)));
    let router = app(&provider);
    let mut body = origin_body();
    body["budget"] = json!(40);
    body["efficiency"] = json!(8.5);
    body["fuelType"] = json!("Regular");

    let (status, body) = send(&router, post_json("/api/volume-based", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body[0]["fuel_volume"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let router = app(&Arc::new(FakeProvider::default()));
    let (status, body) = send(
        &router,
        post_json("/api/distances-only", json!({ "origin": "nowhere" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid origin");
}

#[tokio::test]
async fn upstream_failure_uses_endpoint_message() {
    let provider = Arc::new(FakeProvider::new(make_stations(1)));
    provider.fail_discovery.store(true, Ordering::SeqCst);
    let router = app(&provider);

    let (status, body) = send(&router, post_json("/api/distances-only", origin_body())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to fetch station data");

    let mut volume = origin_body();
    volume["budget"] = json!(40);
    volume["efficiency"] = json!(8.5);
    let (status, body) = send(&router, post_json("/api/volume-based", volume)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to calculate volume-based data");
}

#[tokio::test]
async fn metrics_expose_counters_and_cache_stats() {
    let provider = Arc::new(FakeProvider::new(make_stations(1)));
    let router = app(&provider);
    send(&router, post_json("/api/distances-only", origin_body())).await;
    send(&router, post_json("/api/distances-only", origin_body())).await;

    let (status, body) = send(&router, Request::get("/api/metrics").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["apiCalls"]["total"], 2);
    assert_eq!(body["apiCalls"]["byType"]["distance"], 2);
    assert_eq!(body["normalization"]["uniqueKeys"], 1);
    assert_eq!(body["normalization"]["cacheHitPotentialPercent"], 50.0);
    assert_eq!(body["cacheStats"]["size"], 1);
    assert_eq!(body["inFlight"], 0);

    let reset = Request::post("/api/metrics/reset").body(Body::empty()).unwrap();
    let (status, _) = send(&router, reset).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&router, Request::get("/api/metrics").body(Body::empty()).unwrap()).await;
    assert_eq!(body["apiCalls"]["total"], 0);
    assert_eq!(body["cacheStats"]["size"], 1);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let router = app(&Arc::new(FakeProvider::default()));
    let response = router
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn searches_over_the_limit_get_429() {
    let provider = Arc::new(FakeProvider::new(make_stations(1)));
    let state = AppState::new(make_search(&provider))
        .with_search_limit(SearchRateLimiter::new(2, Duration::from_secs(60)).unwrap());
    let router = create_router(state);

    let from = |ip: &'static str| {
        let mut request = post_json("/api/distances-only", origin_body());
        request
            .headers_mut()
            .insert("x-forwarded-for", ip.parse().unwrap());
        request
    };

    for _ in 0..2 {
        let (status, _) = send(&router, from("198.51.100.9")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = router.clone().oneshot(from("198.51.100.9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "RATE_LIMITED");

    // Volume searches share the same bucket.
    let mut volume = post_json(
        "/api/volume-based",
        json!({ "origin": { "lat": ORIGIN.lat, "lng": ORIGIN.lng }, "budget": 40, "efficiency": 8.5 }),
    );
    volume
        .headers_mut()
        .insert("x-forwarded-for", "198.51.100.9".parse().unwrap());
    let (status, _) = send(&router, volume).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = send(&router, from("198.51.100.10")).await;
    assert_eq!(status, StatusCode::OK);

    let health = Request::get("/api/health")
        .header("x-forwarded-for", "198.51.100.9")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&router, health).await;
    assert_eq!(status, StatusCode::OK);
}
