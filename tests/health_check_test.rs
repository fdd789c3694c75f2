use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use booking_intake::{
    build_router,
    forwarder::{ForwarderConfig, SheetsForwarder},
    rate_limit::{RateLimitConfig, RateLimiter},
    state::AppState,
};
use serde_json::Value;
use tower::ServiceExt;

fn router() -> axum::Router {
    let forwarder = SheetsForwarder::new(ForwarderConfig {
        url: "http://127.0.0.1:9/exec".to_string(),
        timeout: Duration::from_secs(1),
        user_agent: "test".to_string(),
        max_redirects: 0,
    })
    .expect("forwarder should build");
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()));
    build_router(AppState::new(limiter, forwarder))
}

async fn get(uri: &str) -> (StatusCode, String) {
    let request = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();
    let response = router().oneshot(request).await.expect("failed to make request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    (status, String::from_utf8(bytes.to_vec()).expect("body should be UTF-8"))
}

#[tokio::test]
async fn health_check_reports_healthy_with_timestamp() {
    let (status, body) = get("/health").await;
    assert_eq!(status, StatusCode::OK);

    let health: Value = serde_json::from_str(&body).expect("health response should be JSON");
    assert_eq!(health["status"], "healthy");

    let timestamp = health["timestamp"].as_str().expect("timestamp should be a string");
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn metrics_expose_booking_counters() {
    // touch a collector so the registry is populated
    booking_intake::metrics::SUBMISSIONS_TOTAL.inc();

    let (status, body) = get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("booking_submissions_total"), "metrics: {body}");
}

#[tokio::test]
async fn submit_route_only_accepts_post() {
    let (status, _) = get("/api/submit-booking").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
