use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Arbitrary key/value readings reported by a provider.
///
/// Ordered so that every renderer produces byte-stable output.
pub type Payload = BTreeMap<String, serde_json::Value>;

/// Payload key carrying the failure reason of a NoData snapshot
pub const ERROR_KEY: &str = "error";

/// Coarse health of one source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// The source produced nothing usable; never conflated with Healthy
    NoData,
    /// Provider left classification to the assembler. Never appears in a report.
    Unclassified,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::NoData => "no_data",
            HealthStatus::Unclassified => "unclassified",
        }
    }

    /// Upper-case label used by the human-facing renderers
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Unhealthy => "UNHEALTHY",
            HealthStatus::NoData => "NO DATA",
            HealthStatus::Unclassified => "UNCLASSIFIED",
        }
    }

    /// Health rank for the classified statuses (higher is healthier).
    ///
    /// Returns `None` for NoData/Unclassified, which are not points on the
    /// health scale.
    pub fn rank(&self) -> Option<u8> {
        match self {
            HealthStatus::Healthy => Some(2),
            HealthStatus::Degraded => Some(1),
            HealthStatus::Unhealthy => Some(0),
            HealthStatus::NoData | HealthStatus::Unclassified => None,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named, timestamped reading from one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub source_id: String,
    pub captured_at: Option<DateTime<Utc>>,
    /// Most recent activity observed at the source, if the source reports one
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    pub status: HealthStatus,
    #[serde(default)]
    pub payload: Payload,
    /// Age of the reading relative to the report, filled in by the assembler
    #[serde(default)]
    pub staleness_seconds: Option<i64>,
}

impl MetricSnapshot {
    /// A successful reading whose status the assembler will classify
    pub fn observed(source_id: impl Into<String>, captured_at: DateTime<Utc>, payload: Payload) -> Self {
        Self {
            source_id: source_id.into(),
            captured_at: Some(captured_at),
            last_activity: None,
            status: HealthStatus::Unclassified,
            payload,
            staleness_seconds: None,
        }
    }

    /// A reading that carries nothing but the reason it failed
    pub fn no_data(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut payload = Payload::new();
        payload.insert(ERROR_KEY.to_string(), serde_json::Value::String(reason.into()));
        Self {
            source_id: source_id.into(),
            captured_at: None,
            last_activity: None,
            status: HealthStatus::NoData,
            payload,
            staleness_seconds: None,
        }
    }

    pub fn with_status(mut self, status: HealthStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_last_activity(mut self, last_activity: Option<DateTime<Utc>>) -> Self {
        self.last_activity = last_activity;
        self
    }

    /// Failure reason, when the provider reported one
    pub fn error(&self) -> Option<&str> {
        self.payload.get(ERROR_KEY).and_then(|v| v.as_str())
    }

    /// True when the payload holds at least one reading besides `error`
    pub fn has_data(&self) -> bool {
        self.payload.keys().any(|k| k != ERROR_KEY)
    }

    pub fn is_no_data(&self) -> bool {
        self.status == HealthStatus::NoData
    }

    /// Look up a numeric reading by dotted path (e.g. `prices.AAPL`)
    pub fn metric(&self, path: &str) -> Option<f64> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut value = self.payload.get(first)?;
        for part in parts {
            value = value.get(part)?;
        }
        value.as_f64()
    }

    /// Timestamp used to measure staleness
    pub fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.last_activity.or(self.captured_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_data_carries_reason() {
        let snap = MetricSnapshot::no_data("positions", "no such table: positions");
        assert_eq!(snap.status, HealthStatus::NoData);
        assert_eq!(snap.error(), Some("no such table: positions"));
        assert!(!snap.has_data());
        assert!(snap.captured_at.is_none());
    }

    #[test]
    fn test_metric_dotted_path() {
        let mut payload = Payload::new();
        payload.insert("prices".into(), json!({"AAPL": 190.5, "MSFT": 410.0}));
        payload.insert("latency_ms".into(), json!(120));
        let snap = MetricSnapshot::observed("market", Utc::now(), payload);

        assert_eq!(snap.metric("prices.AAPL"), Some(190.5));
        assert_eq!(snap.metric("latency_ms"), Some(120.0));
        assert_eq!(snap.metric("prices.TSLA"), None);
        assert_eq!(snap.metric("missing"), None);
    }

    #[test]
    fn test_status_serde_names() {
        assert_eq!(serde_json::to_string(&HealthStatus::NoData).unwrap(), "\"no_data\"");
        let parsed: HealthStatus = serde_json::from_str("\"degraded\"").unwrap();
        assert_eq!(parsed, HealthStatus::Degraded);
    }

    #[test]
    fn test_rank_ordering() {
        assert!(HealthStatus::Healthy.rank() > HealthStatus::Degraded.rank());
        assert!(HealthStatus::Degraded.rank() > HealthStatus::Unhealthy.rank());
        assert_eq!(HealthStatus::NoData.rank(), None);
    }
}
