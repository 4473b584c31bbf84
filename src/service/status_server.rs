//! Status HTTP server
//!
//! Exposes the latest report to process supervisors and humans:
//! liveness, an overall health probe, the report itself, and a refresh hook.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{AggregatedReport, HealthStatus};
use crate::error::{Result, SentinelError};
use crate::render::{render, Format, RenderContext};

use super::{LatestReport, ShutdownToken};

#[derive(Debug, Clone, Serialize)]
pub struct SourceHealth {
    pub source_id: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staleness_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `/health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub no_data: usize,
    pub alerts: usize,
    pub sources: Vec<SourceHealth>,
}

impl HealthResponse {
    fn build(report: Option<&AggregatedReport>, started_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        let uptime_seconds = (now - started_at).num_seconds().max(0) as u64;

        let Some(report) = report else {
            return Self {
                status: HealthStatus::NoData,
                timestamp: now,
                uptime_seconds,
                pass_id: None,
                generated_at: None,
                healthy: 0,
                degraded: 0,
                unhealthy: 0,
                no_data: 0,
                alerts: 0,
                sources: Vec::new(),
            };
        };

        let counts = report.counts();
        Self {
            status: report.overall_status(),
            timestamp: now,
            uptime_seconds,
            pass_id: Some(report.pass_id),
            generated_at: Some(report.generated_at),
            healthy: counts.healthy,
            degraded: counts.degraded,
            unhealthy: counts.unhealthy,
            no_data: counts.no_data,
            alerts: report.alerts.len(),
            sources: report
                .snapshots
                .values()
                .map(|snap| SourceHealth {
                    source_id: snap.source_id.clone(),
                    status: snap.status,
                    staleness_seconds: snap.staleness_seconds,
                    error: snap.error().map(str::to_string),
                })
                .collect(),
        }
    }
}

/// Shared state for the status routes
#[derive(Clone)]
pub struct StatusState {
    pub started_at: DateTime<Utc>,
    latest: LatestReport,
    trigger: mpsc::Sender<()>,
}

impl StatusState {
    pub fn new(latest: LatestReport, trigger: mpsc::Sender<()>) -> Self {
        Self {
            started_at: Utc::now(),
            latest,
            trigger,
        }
    }

    fn report(&self) -> Option<Arc<AggregatedReport>> {
        self.latest.borrow().clone()
    }
}

pub fn router(state: StatusState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(liveness_handler))
        .route("/health", get(health_handler))
        .route("/report", get(report_json_handler))
        .route("/report.html", get(report_html_handler))
        .route("/refresh", post(refresh_handler))
        .layer(cors)
        .with_state(state)
}

pub struct StatusServer {
    state: StatusState,
    port: u16,
}

impl StatusServer {
    pub fn new(state: StatusState, port: u16) -> Self {
        Self { state, port }
    }

    /// Serve until shutdown
    pub async fn run(self, mut shutdown: ShutdownToken) -> Result<()> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting status server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
            })
            .await
            .map_err(|e| SentinelError::Internal(format!("Status server error: {}", e)))?;

        info!("Status server stopped");
        Ok(())
    }
}

/// Process is up
async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Overall health of the last pass; 503 when unhealthy or before the first pass
async fn health_handler(State(state): State<StatusState>) -> impl IntoResponse {
    let report = state.report();
    let health = HealthResponse::build(report.as_deref(), state.started_at);
    let status_code = match (report.is_some(), health.status) {
        (false, _) => StatusCode::SERVICE_UNAVAILABLE,
        (true, HealthStatus::Unhealthy) => StatusCode::SERVICE_UNAVAILABLE,
        // Degraded and missing data still answer 200
        (true, _) => StatusCode::OK,
    };
    (status_code, Json(health))
}

async fn report_json_handler(State(state): State<StatusState>) -> Response {
    match state.report() {
        Some(report) => Json(report.as_ref().clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "no report yet").into_response(),
    }
}

async fn report_html_handler(State(state): State<StatusState>) -> Response {
    let Some(report) = state.report() else {
        return (StatusCode::NOT_FOUND, "no report yet").into_response();
    };

    match render(&report, Format::Html, &RenderContext::now()) {
        Ok(doc) => (
            [(header::CONTENT_TYPE, Format::Html.content_type())],
            doc.content,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "html render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Queue an on-demand pass; a pass already queued absorbs this one
async fn refresh_handler(State(state): State<StatusState>) -> impl IntoResponse {
    match state.trigger.try_send(()) {
        Ok(()) | Err(mpsc::error::TrySendError::Full(())) => StatusCode::ACCEPTED,
        Err(mpsc::error::TrySendError::Closed(())) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
