use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::domain::{Alert, HealthStatus, MetricSnapshot, Severity};
use crate::render::format_age;

/// Provider-specific threshold, e.g. "average latency over 10s"
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThresholdRule {
    /// Rule name; also the alert category used for cooldowns
    pub name: String,
    pub source_id: String,
    /// Dotted payload path of a numeric reading
    pub metric: String,
    #[serde(default)]
    pub above: Option<f64>,
    #[serde(default)]
    pub below: Option<f64>,
    pub severity: Severity,
    #[serde(default)]
    pub message: Option<String>,
}

impl ThresholdRule {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.metric.trim().is_empty() {
            return Err("metric must not be empty".to_string());
        }
        match (self.above, self.below) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err("exactly one of `above` or `below` must be set".to_string()),
        }
    }

    fn breached_by(&self, value: f64) -> bool {
        match (self.above, self.below) {
            (Some(limit), _) => value > limit,
            (None, Some(limit)) => value < limit,
            (None, None) => false,
        }
    }

    /// Alert for `snapshot` when the rule's metric is present and breached
    pub fn evaluate(&self, snapshot: &MetricSnapshot, detected_at: DateTime<Utc>) -> Option<Alert> {
        let value = snapshot.metric(&self.metric)?;
        if !self.breached_by(value) {
            return None;
        }

        let message = match &self.message {
            Some(custom) => format!("{custom} ({} = {value})", self.metric),
            None => match (self.above, self.below) {
                (Some(limit), _) => format!("{} = {value} above {limit}", self.metric),
                (_, Some(limit)) => format!("{} = {value} below {limit}", self.metric),
                _ => format!("{} = {value}", self.metric),
            },
        };

        Some(Alert::new(
            self.severity,
            &self.source_id,
            &self.name,
            message,
            detected_at,
        ))
    }
}

/// Inputs to alert derivation
#[derive(Debug, Clone, Default)]
pub struct AlertPolicy {
    pub rules: Vec<ThresholdRule>,
    /// Warn about sources that produced no data
    pub alert_on_no_data: bool,
}

/// Category used for status alerts of a source
pub fn health_category(source_id: &str) -> String {
    format!("health:{source_id}")
}

/// Derive the alert list for one pass.
///
/// Output is ordered Critical before Warning, then by `source_id`, then by
/// category.
pub fn derive_alerts(
    snapshots: &BTreeMap<String, MetricSnapshot>,
    policy: &AlertPolicy,
    detected_at: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for snapshot in snapshots.values() {
        let age = snapshot
            .staleness_seconds
            .map(|s| format!(" (last activity {} ago)", format_age(s)))
            .unwrap_or_default();

        let status_alert = match snapshot.status {
            HealthStatus::Degraded => Some((Severity::Warning, format!("source degraded{age}"))),
            HealthStatus::Unhealthy => Some((Severity::Critical, format!("source unhealthy{age}"))),
            HealthStatus::NoData if policy.alert_on_no_data => Some((
                Severity::Warning,
                format!(
                    "no data: {}",
                    snapshot.error().unwrap_or("provider returned nothing")
                ),
            )),
            _ => None,
        };

        if let Some((severity, message)) = status_alert {
            alerts.push(Alert::new(
                severity,
                &snapshot.source_id,
                &health_category(&snapshot.source_id),
                message,
                detected_at,
            ));
        }
    }

    for rule in &policy.rules {
        if let Some(snapshot) = snapshots.get(&rule.source_id) {
            if let Some(alert) = rule.evaluate(snapshot, detected_at) {
                alerts.push(alert);
            }
        }
    }

    alerts.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.source_id.cmp(&b.source_id))
            .then_with(|| a.category.cmp(&b.category))
    });
    alerts
}
