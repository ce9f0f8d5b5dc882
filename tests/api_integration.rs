//! Integration tests for the HTTP API
//!
//! These exercise the router end-to-end over an in-memory SQLite store:
//! beacons go in through `/navigation` and come back aggregated from
//! `/site/{hostname}`.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use rum_diary::config::ReportingConfig;
use rum_diary::models::Hit;
use rum_diary::storage::{HitStore, SqliteStorage};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn HitStore> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn create_app(storage: &Arc<dyn HitStore>) -> Router {
    rum_diary::api::create_api_router(Arc::clone(storage), ReportingConfig::default())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_beacon(app: Router, beacon: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/navigation")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::ORIGIN, "https://tracked.example.com")
                .body(Body::from(beacon.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

async fn seed(storage: &Arc<dyn HitStore>, hit: Value) {
    let hit: Hit = serde_json::from_value(hit).unwrap();
    storage.insert_hit(&hit).await.unwrap();
}

#[tokio::test]
async fn test_health_check() {
    let storage = create_test_storage().await;
    let (status, json) = get_json(create_app(&storage), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "OK");
}

#[tokio::test]
async fn test_beacon_is_stored() {
    let storage = create_test_storage().await;

    let (status, json) = post_beacon(
        create_app(&storage),
        json!({
            "hostname": "tracked.example.com",
            "path": "/",
            "referrer": "https://www.search.example/?q=diary",
            "navigationTiming": { "navigationStart": 0, "loadEventEnd": 750 }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["referrer_hostname"], "www.search.example");
    assert_eq!(
        storage.hostnames().await.unwrap(),
        vec!["tracked.example.com"]
    );
}

#[tokio::test]
async fn test_beacon_allows_cross_origin_posts() {
    let storage = create_test_storage().await;

    let response = create_app(&storage)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/navigation")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::ORIGIN, "https://tracked.example.com")
                .body(Body::from(json!({ "hostname": "tracked.example.com" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_beacon_without_hostname_is_rejected() {
    let storage = create_test_storage().await;

    let (status, json) = post_beacon(create_app(&storage), json!({ "path": "/" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "hostname is required");
}

#[tokio::test]
async fn test_site_report_aggregates_stored_hits() {
    let storage = create_test_storage().await;

    seed(
        &storage,
        json!({
            "hostname": "site.test", "path": "/a",
            "referrer": "https://ref.test/x", "referrer_hostname": "ref.test",
            "createdAt": "2024-01-01T09:00:00Z", "updatedAt": "2024-01-01T09:00:00Z",
            "navigationTiming": { "domLoading": 20, "loadEventEnd": 100 }
        }),
    )
    .await;
    seed(
        &storage,
        json!({
            "hostname": "site.test", "path": "/a",
            "createdAt": "2024-01-02T09:00:00Z", "updatedAt": "2024-01-02T09:00:00Z",
            "navigationTiming": { "domLoading": 30, "loadEventEnd": 110 }
        }),
    )
    .await;
    seed(
        &storage,
        json!({
            "hostname": "site.test", "path": "/b",
            "createdAt": "2024-01-01T18:00:00Z", "updatedAt": "2024-01-01T18:00:00Z"
        }),
    )
    .await;
    seed(
        &storage,
        json!({
            "hostname": "other.test", "path": "/a",
            "createdAt": "2024-01-01T10:00:00Z", "updatedAt": "2024-01-01T10:00:00Z"
        }),
    )
    .await;

    let (status, json) = get_json(
        create_app(&storage),
        "/site/site.test?start=2024-01-01T00:00:00Z&end=2024-01-02T23:59:59Z&calculate=mean,median",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["processing_time"].is_u64());

    assert_eq!(json["hits_per_page"]["__all"], 3);
    assert_eq!(json["hits_per_page"]["/a"], 2);
    assert_eq!(json["hostnames"]["site.test"], 3);
    assert!(json["hostnames"].get("other.test").is_none());

    assert_eq!(json["hits_per_day"]["__all"][0]["date"], "2024-01-01");
    assert_eq!(json["hits_per_day"]["__all"][0]["hits"], 2);
    assert_eq!(json["hits_per_day"]["__all"][1]["hits"], 1);
    assert_eq!(json["hits_per_day"]["/b"][1]["hits"], 0);

    assert_eq!(json["referrers"]["counts"]["ref.test"], 1);
    assert_eq!(json["referrers"]["by_count"][0]["hostname"], "ref.test");

    assert_eq!(json["navigation"]["mean"]["processingDuration"], 80.0);
    assert_eq!(json["navigation"]["median"]["processingDuration"], 80.0);
    assert!(json["navigation"].get("percentile").is_none());
}

#[tokio::test]
async fn test_site_report_with_selected_fields() {
    let storage = create_test_storage().await;
    seed(
        &storage,
        json!({
            "hostname": "site.test", "path": "/",
            "createdAt": "2024-01-01T09:00:00Z", "updatedAt": "2024-01-01T09:00:00Z"
        }),
    )
    .await;

    let (status, json) = get_json(
        create_app(&storage),
        "/site/site.test?start=2024-01-01T00:00:00Z&end=2024-01-01T23:00:00Z&fields=hits_per_page",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let object = json.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert!(object.contains_key("hits_per_page"));
    assert!(object.contains_key("processing_time"));
}

#[tokio::test]
async fn test_site_report_rejects_unknown_field() {
    let storage = create_test_storage().await;

    let (status, json) =
        get_json(create_app(&storage), "/site/site.test?fields=hits_per_page,bogus").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "unknown_field");
}

#[tokio::test]
async fn test_site_report_statistic_failure_is_server_error() {
    let storage = create_test_storage().await;

    let (status, json) = get_json(
        create_app(&storage),
        "/site/site.test?fields=navigation&calculate=percentile&percentile=250",
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["kind"], "statistic");
}

#[tokio::test]
async fn test_site_report_reversed_range() {
    let storage = create_test_storage().await;

    let (status, json) = get_json(
        create_app(&storage),
        "/site/site.test?start=2024-02-01T00:00:00Z&end=2024-01-01T00:00:00Z",
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["kind"], "invalid_date_range");
}

#[tokio::test]
async fn test_site_report_rejects_span_wider_than_configured_limit() {
    let storage = create_test_storage().await;
    for i in 0..3 {
        seed(
            &storage,
            json!({
                "hostname": "s.com", "path": format!("/p{i}"),
                "createdAt": "2024-01-01T09:00:00Z", "updatedAt": "2024-01-01T09:00:00Z"
            }),
        )
        .await;
    }

    let (status, json) = get_json(
        create_app(&storage),
        "/site/s.com?fields=hits_per_day&start=0001-01-01T00:00:00Z&end=9999-12-31T00:00:00Z",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "range_too_large");

    let narrow = ReportingConfig {
        max_days: 7,
        ..Default::default()
    };
    let app = rum_diary::api::create_api_router(Arc::clone(&storage), narrow);
    let (status, json) = get_json(
        app.clone(),
        "/site/s.com?fields=hits_per_day&start=2024-01-01T00:00:00Z&end=2024-01-09T00:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "range_too_large");

    let (status, json) = get_json(
        app,
        "/site/s.com?fields=hits_per_day&start=2024-01-01T00:00:00Z&end=2024-01-07T23:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hits_per_day"]["__all"].as_array().unwrap().len(), 7);
    assert_eq!(json["hits_per_day"]["__all"][0]["hits"], 3);
}

#[tokio::test]
async fn test_list_sites() {
    let storage = create_test_storage().await;
    for hostname in ["b.test", "a.test"] {
        seed(
            &storage,
            json!({
                "hostname": hostname,
                "createdAt": "2024-01-01T09:00:00Z", "updatedAt": "2024-01-01T09:00:00Z"
            }),
        )
        .await;
    }

    let (status, json) = get_json(create_app(&storage), "/sites").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!(["a.test", "b.test"]));
}
