//! A full pass through render, file delivery and the alert gate

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use sentinel::config::AlertPolicyConfig;
use sentinel::delivery::{
    DeliveryAdapter, DeliveryResult, FileSink, GateDecision, GatePolicy, SuppressReason,
};
use sentinel::domain::{Alert, Payload, Severity};
use sentinel::providers::{MetricProvider, StaticProvider};
use sentinel::render::{Format, RenderedDocument};
use sentinel::supervisor::AlertDispatcher;
use sentinel::{AggregationService, AssemblerConfig, SnapshotAssembler};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Pager {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl DeliveryAdapter for Pager {
    fn name(&self) -> &str {
        "pager"
    }

    fn format(&self) -> Format {
        Format::Terminal
    }

    async fn deliver(&self, _document: &RenderedDocument) -> DeliveryResult {
        DeliveryResult::failed("pager does not take reports")
    }

    async fn notify(&self, alert: &Alert) -> DeliveryResult {
        self.sent.lock().unwrap().push(alert.headline());
        DeliveryResult::Delivered
    }
}

fn providers() -> Vec<Arc<dyn MetricProvider>> {
    let mut payload = Payload::new();
    payload.insert("message_count".into(), json!(2));
    let stale = StaticProvider::new("risk", payload.clone())
        .with_last_activity(Utc::now() - ChronoDuration::hours(100));
    let fresh = StaticProvider::new("trading", payload);
    vec![
        Arc::new(stale) as Arc<dyn MetricProvider>,
        Arc::new(fresh) as Arc<dyn MetricProvider>,
    ]
}

#[tokio::test]
async fn test_pass_writes_reports_and_gates_alerts() {
    let dir = tempfile::tempdir().unwrap();
    let html = FileSink::new("archive", Format::Html, dir.path(), "sentinel_report");
    let json = FileSink::new("archive_json", Format::Json, dir.path(), "sentinel_report");
    let latest_html = html.latest_path();
    let latest_json = json.latest_path();

    let pager = Arc::new(Pager::default());
    let service = AggregationService::new(
        SnapshotAssembler::new(providers(), AssemblerConfig::default()),
        vec![
            Arc::new(html) as Arc<dyn DeliveryAdapter>,
            Arc::new(json) as Arc<dyn DeliveryAdapter>,
        ],
        AlertDispatcher::new(
            GatePolicy::default(),
            vec![pager.clone() as Arc<dyn DeliveryAdapter>],
        ),
        Duration::from_secs(300),
    );

    let first = service.trigger().await.unwrap();
    assert_eq!(first.failed_deliveries(), 0);
    assert_eq!(first.alerts.len(), 1);
    assert_eq!(first.alerts[0].decision, GateDecision::Send);

    let page = std::fs::read_to_string(&latest_html).unwrap();
    assert!(page.contains("UNHEALTHY"));
    let parsed = sentinel::render::json::parse(&std::fs::read_to_string(&latest_json).unwrap()).unwrap();
    assert_eq!(parsed, *first.report);

    // Same condition on the next pass sits inside the 60 minute cooldown
    let second = service.trigger().await.unwrap();
    assert!(matches!(
        second.alerts[0].decision,
        GateDecision::Suppress(SuppressReason::Cooldown { .. })
    ));
    assert!(matches!(
        second.alerts[0].results[0].1,
        DeliveryResult::Suppressed { .. }
    ));

    assert_eq!(pager.sent.lock().unwrap().len(), 1);
    assert!(pager.sent.lock().unwrap()[0].starts_with("[CRITICAL] risk:"));
    assert_eq!(
        service.dispatcher().get_suppressed_counts().await.get("health:risk"),
        Some(&1)
    );
}

#[tokio::test]
async fn test_quiet_hours_from_config_hold_back_warnings_only() {
    let config = AlertPolicyConfig {
        quiet_hours: Some(sentinel::config::QuietHoursConfig {
            start: "22:00".into(),
            end: "07:00".into(),
        }),
        // New York winter time
        utc_offset_minutes: -300,
        ..AlertPolicyConfig::default()
    };
    let pager = Arc::new(Pager::default());
    let dispatcher = AlertDispatcher::new(
        GatePolicy::from_config(&config).unwrap(),
        vec![pager.clone() as Arc<dyn DeliveryAdapter>],
    );

    // 04:00 UTC is 23:00 local
    let night = Utc.with_ymd_and_hms(2026, 1, 15, 4, 0, 0).unwrap();
    let warning = Alert::new(Severity::Warning, "research", "health:research", "source degraded", night);
    let critical = Alert::new(Severity::Critical, "positions", "daily_pnl", "loss limit breached", night);

    let outcomes = dispatcher.dispatch_at(&[critical, warning], night).await;
    assert_eq!(outcomes[0].decision, GateDecision::Send);
    assert_eq!(
        outcomes[1].decision,
        GateDecision::Suppress(SuppressReason::QuietHours)
    );
    assert_eq!(pager.sent.lock().unwrap().len(), 1);
}
