//! Alert dispatcher
//!
//! Routes each pass's alerts through the per-category gate to the alert
//! sinks. Suppressed sends are logged and counted, never dropped silently.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::delivery::{AlertGate, DeliveryAdapter, DeliveryResult, GateDecision, GatePolicy};
use crate::domain::{Alert, Severity};

/// What happened to one alert
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub alert: Alert,
    pub decision: GateDecision,
    /// Per-sink result, in sink order
    pub results: Vec<(String, DeliveryResult)>,
}

/// Gate + sinks for alert deliveries
pub struct AlertDispatcher {
    gate: Arc<RwLock<AlertGate>>,
    sinks: Vec<Arc<dyn DeliveryAdapter>>,
    suppressed: Arc<RwLock<HashMap<String, u32>>>,
}

impl AlertDispatcher {
    pub fn new(policy: GatePolicy, sinks: Vec<Arc<dyn DeliveryAdapter>>) -> Self {
        Self {
            gate: Arc::new(RwLock::new(AlertGate::new(policy))),
            sinks,
            suppressed: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Dispatch a pass's alerts against the wall clock
    pub async fn dispatch(&self, alerts: &[Alert]) -> Vec<DispatchOutcome> {
        self.dispatch_at(alerts, Utc::now()).await
    }

    pub async fn dispatch_at(&self, alerts: &[Alert], now: DateTime<Utc>) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::with_capacity(alerts.len());
        for alert in alerts {
            outcomes.push(self.dispatch_one(alert, now).await);
        }
        outcomes
    }

    async fn dispatch_one(&self, alert: &Alert, now: DateTime<Utc>) -> DispatchOutcome {
        match alert.severity {
            Severity::Warning => warn!(
                source = %alert.source_id,
                category = %alert.category,
                "{}",
                alert.message
            ),
            Severity::Critical => error!(
                source = %alert.source_id,
                category = %alert.category,
                "CRITICAL {}",
                alert.message
            ),
        }

        let decision = self
            .gate
            .write()
            .await
            .check(&alert.category, alert.severity, now);

        let results = match decision {
            GateDecision::Suppress(reason) => {
                let count = {
                    let mut suppressed = self.suppressed.write().await;
                    let count = suppressed.entry(alert.category.clone()).or_insert(0);
                    *count += 1;
                    *count
                };
                info!(
                    category = %alert.category,
                    severity = %alert.severity,
                    %reason,
                    suppressed_total = count,
                    "alert suppressed"
                );
                self.sinks
                    .iter()
                    .map(|sink| {
                        (
                            sink.name().to_string(),
                            DeliveryResult::Suppressed {
                                reason: reason.to_string(),
                            },
                        )
                    })
                    .collect()
            }
            GateDecision::Send => {
                let results: Vec<(String, DeliveryResult)> = join_all(self.sinks.iter().map(|sink| async move {
                    (sink.name().to_string(), sink.notify(alert).await)
                }))
                .await;

                for (sink, result) in &results {
                    match result {
                        DeliveryResult::Delivered => debug!(%sink, category = %alert.category, "alert delivered"),
                        other => warn!(%sink, category = %alert.category, result = %other, "alert not delivered"),
                    }
                }

                // Nothing reached a sink, so the category must not start cooling
                if !self.sinks.is_empty() && !results.iter().any(|(_, r)| r.is_delivered()) {
                    self.gate.write().await.release(&alert.category);
                }
                results
            }
        };

        DispatchOutcome {
            alert: alert.clone(),
            decision,
            results,
        }
    }

    /// Suppressed sends per category since start
    pub async fn get_suppressed_counts(&self) -> HashMap<String, u32> {
        self.suppressed.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::SuppressReason;
    use crate::render::{Format, RenderedDocument};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct Recording {
        sent: AtomicU32,
        fail: AtomicBool,
    }

    impl Recording {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: AtomicU32::new(0),
                fail: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl DeliveryAdapter for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn format(&self) -> Format {
            Format::Terminal
        }

        async fn deliver(&self, _document: &RenderedDocument) -> DeliveryResult {
            DeliveryResult::Delivered
        }

        async fn notify(&self, _alert: &Alert) -> DeliveryResult {
            if self.fail.load(Ordering::SeqCst) {
                return DeliveryResult::failed("gateway down");
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            DeliveryResult::Delivered
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    fn pnl_alert(at: DateTime<Utc>) -> Alert {
        Alert::new(Severity::Critical, "positions", "daily_pnl", "loss limit breached", at)
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_and_counts() {
        let sink = Recording::new();
        let dispatcher = AlertDispatcher::new(GatePolicy::default(), vec![sink.clone() as Arc<dyn DeliveryAdapter>]);

        let first = dispatcher.dispatch_at(&[pnl_alert(t0())], t0()).await;
        assert_eq!(first[0].decision, GateDecision::Send);

        let t30 = t0() + Duration::minutes(30);
        let second = dispatcher.dispatch_at(&[pnl_alert(t30)], t30).await;
        assert_eq!(
            second[0].decision,
            GateDecision::Suppress(SuppressReason::Cooldown {
                remaining: Duration::minutes(30)
            })
        );
        assert!(matches!(second[0].results[0].1, DeliveryResult::Suppressed { .. }));

        let t61 = t0() + Duration::minutes(61);
        let third = dispatcher.dispatch_at(&[pnl_alert(t61)], t61).await;
        assert_eq!(third[0].decision, GateDecision::Send);

        assert_eq!(sink.sent.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.get_suppressed_counts().await.get("daily_pnl"), Some(&1));
    }

    #[tokio::test]
    async fn test_failed_send_does_not_start_cooldown() {
        let sink = Recording::new();
        sink.fail.store(true, Ordering::SeqCst);
        let dispatcher = AlertDispatcher::new(GatePolicy::default(), vec![sink.clone() as Arc<dyn DeliveryAdapter>]);

        dispatcher.dispatch_at(&[pnl_alert(t0())], t0()).await;
        sink.fail.store(false, Ordering::SeqCst);

        let retry_at = t0() + Duration::minutes(5);
        let outcome = dispatcher.dispatch_at(&[pnl_alert(retry_at)], retry_at).await;
        assert_eq!(outcome[0].decision, GateDecision::Send);
        assert_eq!(sink.sent.load(Ordering::SeqCst), 1);
    }
}
