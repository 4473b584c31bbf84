use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::snapshot::{HealthStatus, MetricSnapshot};

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    /// Emoji prefix for chat-style sinks
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Warning => "\u{26a0}\u{fe0f}", // warning sign
            Severity::Critical => "\u{1f6a8}",       // police light
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fact derived during one aggregation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub source_id: String,
    /// Cooldown key (`health:<source>` or the rule name)
    pub category: String,
    pub message: String,
    pub detected_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        severity: Severity,
        source_id: &str,
        category: &str,
        message: impl Into<String>,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            severity,
            source_id: source_id.to_string(),
            category: category.to_string(),
            message: message.into(),
            detected_at,
        }
    }

    /// One-line form used by SMS and chat sinks
    pub fn headline(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.severity.as_str().to_uppercase(),
            self.source_id,
            self.message
        )
    }
}

/// Per-status source counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub no_data: usize,
}

/// The merge of every provider's snapshot at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub pass_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub snapshots: BTreeMap<String, MetricSnapshot>,
    pub alerts: Vec<Alert>,
}

impl AggregatedReport {
    pub fn snapshot(&self, source_id: &str) -> Option<&MetricSnapshot> {
        self.snapshots.get(source_id)
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for snap in self.snapshots.values() {
            match snap.status {
                HealthStatus::Healthy => counts.healthy += 1,
                HealthStatus::Degraded => counts.degraded += 1,
                HealthStatus::Unhealthy => counts.unhealthy += 1,
                HealthStatus::NoData | HealthStatus::Unclassified => counts.no_data += 1,
            }
        }
        counts
    }

    /// Worst status across all sources.
    ///
    /// Missing data outranks Healthy so an all-silent system never reads as fine.
    pub fn overall_status(&self) -> HealthStatus {
        let counts = self.counts();
        if counts.unhealthy > 0 {
            HealthStatus::Unhealthy
        } else if counts.degraded > 0 {
            HealthStatus::Degraded
        } else if counts.no_data > 0 {
            HealthStatus::NoData
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn critical_count(&self) -> usize {
        self.alerts
            .iter()
            .filter(|a| a.severity == Severity::Critical)
            .count()
    }

    /// Verify the structural invariants every renderer relies on
    pub fn check_invariants(&self) -> Result<(), String> {
        for (key, snap) in &self.snapshots {
            if key != &snap.source_id {
                return Err(format!(
                    "snapshot keyed '{}' reports source_id '{}'",
                    key, snap.source_id
                ));
            }
            if snap.status == HealthStatus::Unclassified {
                return Err(format!("snapshot '{}' was never classified", key));
            }
            let missing = snap.captured_at.is_none() || !snap.has_data();
            if missing != snap.is_no_data() {
                return Err(format!(
                    "snapshot '{}' has status {} but {} data",
                    key,
                    snap.status,
                    if missing { "no" } else { "some" }
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Payload;
    use serde_json::json;

    fn snap(id: &str, status: HealthStatus) -> MetricSnapshot {
        if status == HealthStatus::NoData {
            return MetricSnapshot::no_data(id, "down");
        }
        let mut payload = Payload::new();
        payload.insert("value".into(), json!(1));
        MetricSnapshot::observed(id, Utc::now(), payload).with_status(status)
    }

    fn report(snaps: Vec<MetricSnapshot>) -> AggregatedReport {
        AggregatedReport {
            pass_id: Uuid::nil(),
            generated_at: Utc::now(),
            snapshots: snaps.into_iter().map(|s| (s.source_id.clone(), s)).collect(),
            alerts: Vec::new(),
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
    }

    #[test]
    fn test_overall_status_prefers_worst() {
        let r = report(vec![
            snap("a", HealthStatus::Healthy),
            snap("b", HealthStatus::NoData),
        ]);
        assert_eq!(r.overall_status(), HealthStatus::NoData);

        let r = report(vec![
            snap("a", HealthStatus::Unhealthy),
            snap("b", HealthStatus::Degraded),
        ]);
        assert_eq!(r.overall_status(), HealthStatus::Unhealthy);

        let r = report(vec![snap("a", HealthStatus::Healthy)]);
        assert_eq!(r.overall_status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_invariants_reject_unclassified() {
        let mut payload = Payload::new();
        payload.insert("value".into(), json!(1));
        let r = report(vec![MetricSnapshot::observed("a", Utc::now(), payload)]);
        assert!(r.check_invariants().is_err());
    }

    #[test]
    fn test_invariants_reject_healthy_without_data() {
        let bad = MetricSnapshot::no_data("a", "boom").with_status(HealthStatus::Healthy);
        let r = report(vec![bad]);
        assert!(r.check_invariants().is_err());

        let r = report(vec![snap("a", HealthStatus::Healthy), snap("b", HealthStatus::NoData)]);
        assert!(r.check_invariants().is_ok());
    }

    #[test]
    fn test_alert_headline() {
        let alert = Alert::new(
            Severity::Critical,
            "positions",
            "daily_pnl",
            "unrealized P&L below -500",
            Utc::now(),
        );
        assert_eq!(alert.headline(), "[CRITICAL] positions: unrealized P&L below -500");
    }
}
