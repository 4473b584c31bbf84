use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::domain::{HealthStatus, MetricSnapshot, Payload};

use super::MetricProvider;

/// Provider that returns a fixed reading
///
/// Used for smoke runs of a configuration and as a building block in tests.
/// An empty payload yields NoData.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    source_id: String,
    payload: Payload,
    status: Option<HealthStatus>,
    last_activity: Option<DateTime<Utc>>,
    delay: Option<Duration>,
}

impl StaticProvider {
    pub fn new(source_id: &str, payload: Payload) -> Self {
        Self {
            source_id: source_id.to_string(),
            payload,
            status: None,
            last_activity: None,
            delay: None,
        }
    }

    /// Report this status instead of leaving classification to the assembler
    pub fn with_status(mut self, status: HealthStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_last_activity(mut self, at: DateTime<Utc>) -> Self {
        self.last_activity = Some(at);
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl MetricProvider for StaticProvider {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch(&self) -> MetricSnapshot {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.payload.is_empty() {
            return MetricSnapshot::no_data(&self.source_id, "static source has no payload");
        }

        // Without a status or timestamp there is nothing to age, so the reading stands as Healthy.
        let status = match (self.status, self.last_activity) {
            (Some(status), _) => status,
            (None, Some(_)) => HealthStatus::Unclassified,
            (None, None) => HealthStatus::Healthy,
        };

        MetricSnapshot::observed(&self.source_id, Utc::now(), self.payload.clone())
            .with_last_activity(self.last_activity)
            .with_status(status)
    }
}
