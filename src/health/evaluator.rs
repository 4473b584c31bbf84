use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::domain::HealthStatus;

/// Age cutoffs for activity-based classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HealthThresholds {
    /// Activity older than this is Degraded (default: 24h)
    #[serde(default = "default_degraded_after_hours")]
    pub degraded_after_hours: u64,
    /// Activity older than this is Unhealthy (default: 72h)
    #[serde(default = "default_unhealthy_after_hours")]
    pub unhealthy_after_hours: u64,
}

fn default_degraded_after_hours() -> u64 {
    24
}

fn default_unhealthy_after_hours() -> u64 {
    72
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded_after_hours: default_degraded_after_hours(),
            unhealthy_after_hours: default_unhealthy_after_hours(),
        }
    }
}

impl HealthThresholds {
    pub fn validate(&self) -> Result<(), String> {
        if self.degraded_after_hours == 0 {
            return Err("degraded_after_hours must be > 0".to_string());
        }
        if self.unhealthy_after_hours <= self.degraded_after_hours {
            return Err(format!(
                "unhealthy_after_hours ({}) must exceed degraded_after_hours ({})",
                self.unhealthy_after_hours, self.degraded_after_hours
            ));
        }
        Ok(())
    }
}

/// Classifier bound to a set of thresholds
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthEvaluator {
    thresholds: HealthThresholds,
}

impl HealthEvaluator {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> HealthThresholds {
        self.thresholds
    }

    /// Classify a last-activity timestamp.
    ///
    /// Under an hour and up to the degraded cutoff are both Healthy. A
    /// timestamp in the future (clock skew) is Healthy.
    pub fn classify(&self, last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> HealthStatus {
        let Some(last) = last_activity else {
            return HealthStatus::NoData;
        };

        let age = now.signed_duration_since(last);
        if age < Duration::zero() {
            return HealthStatus::Healthy;
        }

        let degraded_after = Duration::hours(self.thresholds.degraded_after_hours as i64);
        let unhealthy_after = Duration::hours(self.thresholds.unhealthy_after_hours as i64);

        if age < degraded_after {
            HealthStatus::Healthy
        } else if age < unhealthy_after {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }
}

/// Classify with the default 24h/72h cutoffs
pub fn classify(last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> HealthStatus {
    HealthEvaluator::default().classify(last_activity, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn aged(minutes: i64) -> Option<DateTime<Utc>> {
        Some(now() - Duration::minutes(minutes))
    }

    #[test]
    fn test_missing_timestamp_is_no_data() {
        assert_eq!(classify(None, now()), HealthStatus::NoData);
    }

    #[test]
    fn test_band_edges() {
        assert_eq!(classify(aged(0), now()), HealthStatus::Healthy);
        assert_eq!(classify(aged(59), now()), HealthStatus::Healthy);
        assert_eq!(classify(aged(60), now()), HealthStatus::Healthy);
        assert_eq!(classify(aged(24 * 60 - 1), now()), HealthStatus::Healthy);
        assert_eq!(classify(aged(24 * 60), now()), HealthStatus::Degraded);
        assert_eq!(classify(aged(72 * 60 - 1), now()), HealthStatus::Degraded);
        assert_eq!(classify(aged(72 * 60), now()), HealthStatus::Unhealthy);
        assert_eq!(classify(aged(30 * 24 * 60), now()), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_future_timestamp_is_healthy() {
        let future = Some(now() + Duration::hours(3));
        assert_eq!(classify(future, now()), HealthStatus::Healthy);
    }

    #[test]
    fn test_custom_thresholds() {
        let evaluator = HealthEvaluator::new(HealthThresholds {
            degraded_after_hours: 1,
            unhealthy_after_hours: 2,
        });
        assert_eq!(evaluator.classify(aged(30), now()), HealthStatus::Healthy);
        assert_eq!(evaluator.classify(aged(90), now()), HealthStatus::Degraded);
        assert_eq!(evaluator.classify(aged(121), now()), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(HealthThresholds::default().validate().is_ok());
        let bad = HealthThresholds {
            degraded_after_hours: 48,
            unhealthy_after_hours: 24,
        };
        assert!(bad.validate().is_err());
    }
}
