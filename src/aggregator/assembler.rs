//! Snapshot assembler
//!
//! Runs one aggregation pass: every provider is fetched in its own task under
//! a timeout, failures and panics are contained as NoData snapshots, statuses
//! are classified, and the alert list is derived from the merged result.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::{AggregatedReport, HealthStatus, MetricSnapshot};
use crate::error::{Result, SentinelError};
use crate::health::{HealthEvaluator, HealthThresholds};
use crate::providers::MetricProvider;

use super::alerts::{derive_alerts, AlertPolicy};

/// Per-pass policy for the assembler
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Budget for a provider without its own entry (default: 5s)
    pub default_timeout: Duration,
    pub timeouts: HashMap<String, Duration>,
    pub default_thresholds: HealthThresholds,
    pub thresholds: HashMap<String, HealthThresholds>,
    pub alert_policy: AlertPolicy,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
            timeouts: HashMap::new(),
            default_thresholds: HealthThresholds::default(),
            thresholds: HashMap::new(),
            alert_policy: AlertPolicy::default(),
        }
    }
}

impl AssemblerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        let timeouts = config
            .providers
            .iter()
            .filter_map(|p| p.timeout_secs.map(|t| (p.id.clone(), Duration::from_secs(t))))
            .collect();
        let thresholds = config
            .providers
            .iter()
            .filter_map(|p| p.health.map(|h| (p.id.clone(), h)))
            .collect();

        Self {
            default_timeout: Duration::from_secs(config.service.provider_timeout_secs),
            timeouts,
            default_thresholds: config.health,
            thresholds,
            alert_policy: AlertPolicy {
                rules: config.rules.clone(),
                alert_on_no_data: config.alerts.alert_on_no_data,
            },
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    fn timeout_for(&self, source_id: &str) -> Duration {
        self.timeouts
            .get(source_id)
            .copied()
            .unwrap_or(self.default_timeout)
    }

    fn evaluator_for(&self, source_id: &str) -> HealthEvaluator {
        HealthEvaluator::new(
            self.thresholds
                .get(source_id)
                .copied()
                .unwrap_or(self.default_thresholds),
        )
    }
}

/// In-flight provider tasks; dropping the set aborts whatever is still running
struct InFlight(Vec<(String, JoinHandle<MetricSnapshot>)>);

impl Drop for InFlight {
    fn drop(&mut self) {
        for (_, handle) in &self.0 {
            handle.abort();
        }
    }
}

/// Merges every provider's snapshot into one [`AggregatedReport`]
pub struct SnapshotAssembler {
    providers: Vec<Arc<dyn MetricProvider>>,
    config: AssemblerConfig,
}

impl SnapshotAssembler {
    pub fn new(providers: Vec<Arc<dyn MetricProvider>>, config: AssemblerConfig) -> Self {
        Self { providers, config }
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.source_id().to_string())
            .collect()
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Run one pass against the wall clock
    pub async fn assemble(&self) -> Result<AggregatedReport> {
        self.assemble_at(Utc::now()).await
    }

    /// Run one pass, classifying and stamping against `now`.
    ///
    /// Fails only when the provider set itself is unusable (empty or with a
    /// duplicate source id). Dropping the returned future aborts every
    /// provider task still in flight.
    #[instrument(skip(self), fields(providers = self.providers.len()))]
    pub async fn assemble_at(&self, now: DateTime<Utc>) -> Result<AggregatedReport> {
        self.check_sources()?;
        let started = Instant::now();

        let mut in_flight = InFlight(Vec::with_capacity(self.providers.len()));
        for provider in &self.providers {
            let source_id = provider.source_id().to_string();
            let budget = self.config.timeout_for(&source_id);
            let provider = Arc::clone(provider);
            let task_id = source_id.clone();

            let handle = tokio::spawn(async move {
                match tokio::time::timeout(budget, provider.fetch()).await {
                    Ok(snapshot) => snapshot,
                    Err(_) => {
                        warn!(source = %task_id, budget_ms = budget.as_millis() as u64, "provider timed out");
                        MetricSnapshot::no_data(&task_id, format!("timed out after {}", format_budget(budget)))
                    }
                }
            });
            in_flight.0.push((source_id, handle));
        }

        let mut snapshots = BTreeMap::new();
        for (source_id, handle) in in_flight.0.iter_mut() {
            let snapshot = match handle.await {
                Ok(snapshot) => snapshot,
                Err(e) => contain_join_error(source_id, e),
            };
            let snapshot = self.normalize(source_id, snapshot, now);
            debug!(source = %source_id, status = %snapshot.status, "snapshot collected");
            snapshots.insert(source_id.clone(), snapshot);
        }
        drop(in_flight);

        let alerts = derive_alerts(&snapshots, &self.config.alert_policy, now);
        let report = AggregatedReport {
            pass_id: Uuid::new_v4(),
            generated_at: now,
            snapshots,
            alerts,
        };

        let counts = report.counts();
        info!(
            pass_id = %report.pass_id,
            healthy = counts.healthy,
            degraded = counts.degraded,
            unhealthy = counts.unhealthy,
            no_data = counts.no_data,
            alerts = report.alerts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "aggregation pass complete"
        );

        Ok(report)
    }

    fn check_sources(&self) -> Result<()> {
        if self.providers.is_empty() {
            return Err(SentinelError::NoProviders);
        }
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.source_id()) {
                return Err(SentinelError::DuplicateSource(provider.source_id().to_string()));
            }
        }
        Ok(())
    }

    /// Bring a provider's snapshot in line with the report invariants
    fn normalize(&self, source_id: &str, mut snapshot: MetricSnapshot, now: DateTime<Utc>) -> MetricSnapshot {
        if snapshot.source_id != source_id {
            warn!(
                expected = %source_id,
                reported = %snapshot.source_id,
                "provider reported a different source id; re-keying"
            );
            snapshot.source_id = source_id.to_string();
        }

        if snapshot.status == HealthStatus::Unclassified {
            if snapshot.last_activity.is_none() {
                return MetricSnapshot::no_data(source_id, "no activity timestamp reported");
            }
            snapshot.status = self
                .config
                .evaluator_for(source_id)
                .classify(snapshot.last_activity, now);
        }

        if snapshot.captured_at.is_none() || !snapshot.has_data() {
            snapshot.status = HealthStatus::NoData;
        } else if snapshot.status == HealthStatus::NoData {
            // A NoData reading carries no capture time, whatever else the provider attached
            snapshot.captured_at = None;
        }

        snapshot.staleness_seconds = snapshot
            .reference_time()
            .map(|at| now.signed_duration_since(at).num_seconds().max(0));
        snapshot
    }
}

fn contain_join_error(source_id: &str, err: JoinError) -> MetricSnapshot {
    if err.is_panic() {
        let panic = err.into_panic();
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        warn!(source = %source_id, %message, "provider panicked");
        MetricSnapshot::no_data(source_id, format!("provider panicked: {message}"))
    } else {
        MetricSnapshot::no_data(source_id, "provider task cancelled")
    }
}

fn format_budget(budget: Duration) -> String {
    if budget.subsec_millis() == 0 {
        format!("{}s", budget.as_secs())
    } else {
        format!("{}ms", budget.as_millis())
    }
}
