use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use ticketsync_demo::models::FeedConfig;
use ticketsync_demo::server::build_app;
use ticketsync_demo::state::FeedState;
use tower::ServiceExt;

async fn call(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let request = request
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_events_endpoint_serves_snapshot_array() {
    let app = build_app(FeedState::new(FeedConfig::default()));

    let (status, body) = call(&app, "GET", "/api/events", None).await;
    assert_eq!(status, StatusCode::OK);

    let events = body.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["id"], 153);
    assert_eq!(events[0]["currentQuantity"], 29_300);
    assert_eq!(events[0]["totalQuota"], 30_000);
}

#[tokio::test]
async fn test_purchase_endpoint_sells_tickets() {
    let state = FeedState::new(FeedConfig::default());
    let app = build_app(state.clone());

    let (status, body) = call(&app, "POST", "/api/sales/purchase", Some(r#"{"quantity":3}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remaining"], 29_297);
    assert_eq!(state.remaining(), 29_297);

    let (status, _) = call(&app, "POST", "/api/sales/purchase", Some(r#"{"quantity":0}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(&app, "GET", "/api/events", None).await;
    assert_eq!(body[0]["currentQuantity"], 29_297);
}

#[tokio::test]
async fn test_sales_start_is_exclusive() {
    let app = build_app(FeedState::new(FeedConfig::default()));

    let (status, _) = call(&app, "POST", "/api/sales/start", Some(r#"{"rate":0.5}"#)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, "POST", "/api/sales/start", Some(r#"{"rate":0.5}"#)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = call(&app, "GET", "/api/sales/status", None).await;
    assert_eq!(body["state"], "running");

    let (status, _) = call(&app, "POST", "/api/sales/stop", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, "GET", "/api/sales/status", None).await;
    assert_eq!(body["state"], "stopped");
}

#[tokio::test]
async fn test_invalid_rate_rejected() {
    let app = build_app(FeedState::new(FeedConfig::default()));

    let (status, _) = call(&app, "POST", "/api/sales/start", Some(r#"{"rate":0}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_unavailable_without_recorder() {
    let app = build_app(FeedState::new(FeedConfig::default()));

    let (status, _) = call(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

async fn allowed_origin(app: &Router, origin: &str) -> Option<String> {
    let request = Request::builder()
        .uri("/health")
        .header("origin", origin)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    response
        .headers()
        .get("access-control-allow-origin")
        .map(|value| value.to_str().unwrap().to_string())
}

#[tokio::test]
async fn test_cors_origins_follow_feed_config() {
    let local = build_app(FeedState::new(FeedConfig::default()));
    assert_eq!(
        allowed_origin(&local, "http://localhost:5173").await.as_deref(),
        Some("http://localhost:5173")
    );
    assert_eq!(allowed_origin(&local, "http://tickets.example").await, None);

    let open = build_app(FeedState::new(FeedConfig {
        allow_any_origin: true,
        ..Default::default()
    }));
    assert_eq!(
        allowed_origin(&open, "http://tickets.example").await.as_deref(),
        Some("*")
    );
}
