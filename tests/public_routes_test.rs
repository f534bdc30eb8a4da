// Health, contact form, places proxy and CORS

mod common;

use axum::http::StatusCode;
use common::{setup_test_app, setup_test_app_with, FakePlaces, FAKE_MAP_PNG};
use serde_json::{json, Value};

#[tokio::test]
async fn test_health_reports_store() {
    let app = setup_test_app().await;

    let response = app.get("/api/health").send().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["components"]["database"]["status"], "healthy");
    assert_eq!(body["components"]["database"]["backend"], "memory");
}

#[tokio::test]
async fn test_contact_requires_all_fields() {
    let app = setup_test_app().await;

    let response = app
        .post("/api/contact")
        .json(&json!({ "name": "Sam", "email": "sam@example.com", "message": "  " }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await;
    assert_eq!(body["error"], "Missing fields");

    let response = app
        .post("/api/contact")
        .json(&json!({ "name": "Sam", "email": "sam@example.com", "message": "Hi there" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn test_autocomplete_defaults_region_codes() {
    let app = setup_test_app().await;

    let body: Value = app
        .post("/api/places/autocomplete")
        .json(&json!({ "input": "   " }))
        .send()
        .await
        .json()
        .await;
    assert_eq!(body, json!({ "items": [] }));

    let body: Value = app
        .post("/api/places/autocomplete")
        .json(&json!({ "input": "pizza" }))
        .send()
        .await
        .json()
        .await;
    assert_eq!(body["items"][0]["placeId"], "ChIJ123");
    assert_eq!(body["items"][0]["mainText"], "pizza");
    assert_eq!(body["items"][0]["secondaryText"], "US");

    let body: Value = app
        .post("/api/places/autocomplete")
        .json(&json!({ "input": "pizza", "includedRegionCodes": ["GB", "IE"] }))
        .send()
        .await
        .json()
        .await;
    assert_eq!(body["items"][0]["secondaryText"], "GB,IE");
}

#[tokio::test]
async fn test_place_details() {
    let app = setup_test_app().await;

    let response = app.get("/api/places/details").send().await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = app
        .get("/api/places/details?placeId=ChIJ999")
        .send()
        .await
        .json()
        .await;
    assert_eq!(body["id"], "ChIJ999");
    assert_eq!(body["displayName"], "Joe's Pizza");
}

#[tokio::test]
async fn test_static_map_and_placeholder() {
    let app = setup_test_app().await;

    let response = app.get("/api/maps/static?lat=40.7&lng=-74.0").send().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.content_type().as_deref(), Some("image/png"));
    assert_eq!(
        response.header("cache-control").as_deref(),
        Some("public, max-age=86400")
    );
    assert_eq!(response.bytes().await, FAKE_MAP_PNG);

    let response = app.get("/api/maps/static?lat=40.7").send().await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let failing = setup_test_app_with(FakePlaces { map_fails: true }).await;
    let response = failing.get("/api/maps/static?lat=40.7&lng=-74.0").send().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.content_type().as_deref(), Some("image/svg+xml"));
    assert_eq!(
        response.header("cache-control").as_deref(),
        Some("public, max-age=600")
    );
    assert!(response.text().await.starts_with("<svg"));
}

#[tokio::test]
async fn test_cors_preflight_and_whitelist() {
    let app = setup_test_app().await;

    let response = app
        .options("/api/stripe/checkout")
        .header("origin", "https://app.example.com")
        .header("access-control-request-method", "POST")
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.header("access-control-allow-origin").as_deref(),
        Some("https://app.example.com")
    );
    assert_eq!(
        response.header("access-control-allow-credentials").as_deref(),
        Some("true")
    );
    assert!(response
        .header("access-control-allow-headers")
        .unwrap()
        .contains("stripe-signature"));

    let response = app
        .get("/api/health")
        .header("origin", "https://evil.example.com")
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.header("access-control-allow-origin").is_none());

    let response = app
        .get("/api/health")
        .header("origin", "https://app.example.com")
        .send()
        .await;
    assert_eq!(
        response.header("access-control-allow-origin").as_deref(),
        Some("https://app.example.com")
    );
}
