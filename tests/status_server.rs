//! Status routes driven through `tower::ServiceExt::oneshot`

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use sentinel::domain::{AggregatedReport, HealthStatus, MetricSnapshot, Payload};
use sentinel::service::status_server::router;
use sentinel::service::StatusState;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tower::ServiceExt;
use uuid::Uuid;

type Latest = watch::Sender<Option<Arc<AggregatedReport>>>;

fn app() -> (Router, Latest, mpsc::Receiver<()>) {
    let (tx, rx) = watch::channel(None);
    let (trigger, trigger_rx) = mpsc::channel(1);
    (router(StatusState::new(rx, trigger)), tx, trigger_rx)
}

fn report(status: HealthStatus) -> AggregatedReport {
    let now = Utc::now();
    let mut payload = Payload::new();
    payload.insert("position_count".into(), json!(4));
    let mut positions = MetricSnapshot::observed("positions", now, payload)
        .with_last_activity(Some(now - Duration::minutes(3)))
        .with_status(status);
    positions.staleness_seconds = Some(180);
    let market = MetricSnapshot::no_data("market", "timed out after 5s");

    AggregatedReport {
        pass_id: Uuid::new_v4(),
        generated_at: now,
        snapshots: [positions, market]
            .into_iter()
            .map(|s| (s.source_id.clone(), s))
            .collect(),
        alerts: Vec::new(),
    }
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_liveness_always_ok() {
    let (app, _latest, _trigger) = app();
    let (status, _) = get(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_before_first_pass() {
    let (app, _latest, _trigger) = app();

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "no_data");

    let (status, _) = get(&app, "/report").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&app, "/report.html").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_reflects_latest_report() {
    let (app, latest, _trigger) = app();

    latest.send_replace(Some(Arc::new(report(HealthStatus::Degraded))));
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["degraded"], 1);
    assert_eq!(health["no_data"], 1);
    let market = health["sources"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["source_id"] == "market")
        .unwrap();
    assert_eq!(market["error"], "timed out after 5s");

    latest.send_replace(Some(Arc::new(report(HealthStatus::Unhealthy))));
    let (status, _) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_report_routes_serve_latest() {
    let (app, latest, _trigger) = app();
    let published = report(HealthStatus::Healthy);
    latest.send_replace(Some(Arc::new(published.clone())));

    let (status, body) = get(&app, "/report").await;
    assert_eq!(status, StatusCode::OK);
    let served: AggregatedReport = serde_json::from_str(&body).unwrap();
    assert_eq!(served, published);

    let (status, body) = get(&app, "/report.html").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<html"));
    assert!(body.contains("NO DATA"));
}

#[tokio::test]
async fn test_refresh_queues_one_pass() {
    let (app, _latest, mut trigger) = app();
    let post = || {
        Request::builder()
            .method("POST")
            .uri("/refresh")
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(post()).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    // Second request coalesces into the queued one
    let response = app.clone().oneshot(post()).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    assert!(trigger.try_recv().is_ok());
    assert!(trigger.try_recv().is_err());
}
