//! Delivery adapters
//!
//! Push rendered reports (and individual alerts) to sinks. Adapters never
//! return errors: every outcome is a [`DeliveryResult`], retried according
//! to the adapter's own [`RetryPolicy`].

pub mod factory;
pub mod file;
pub mod gate;
pub mod smtp;
pub mod stdout;
pub mod webhook;

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::domain::Alert;
use crate::error::SentinelError;
use crate::render::{Format, RenderedDocument};

pub use factory::{build_sinks, Sinks};
pub use file::FileSink;
pub use gate::{AlertGate, GateDecision, GatePolicy, GateState, QuietHours, SuppressReason};
pub use smtp::{EmailSink, SmsSink, SmtpMailer};
pub use stdout::StdoutSink;
pub use webhook::WebhookSink;

/// Outcome of one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    Delivered,
    Failed { reason: String },
    /// Withheld by cooldown or quiet hours; logged, never silently dropped
    Suppressed { reason: String },
}

impl DeliveryResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        DeliveryResult::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryResult::Delivered)
    }
}

impl fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryResult::Delivered => write!(f, "delivered"),
            DeliveryResult::Failed { reason } => write!(f, "failed: {reason}"),
            DeliveryResult::Suppressed { reason } => write!(f, "suppressed: {reason}"),
        }
    }
}

/// Errors stop at the adapter boundary and surface as a failed delivery
impl From<SentinelError> for DeliveryResult {
    fn from(err: SentinelError) -> Self {
        DeliveryResult::failed(err.to_string())
    }
}

/// A sink for rendered reports and alerts
#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Format of the documents this sink expects
    fn format(&self) -> Format;

    async fn deliver(&self, document: &RenderedDocument) -> DeliveryResult;

    /// Deliver a single alert. Sinks that only carry reports refuse.
    async fn notify(&self, alert: &Alert) -> DeliveryResult {
        let _ = alert;
        DeliveryResult::failed(format!("sink '{}' does not carry alerts", self.name()))
    }
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (default: 3)
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled after each failure (default: 500ms)
    pub base_backoff: Duration,
    /// Upper bound on a single delay (default: 30s)
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(cfg: RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_backoff: Duration::from_millis(cfg.backoff_ms),
            ..Default::default()
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay after the `failures`-th failed attempt (1-based)
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `attempt` until it succeeds or the attempts are used up
    pub async fn run<F, Fut>(&self, sink: &str, mut attempt: F) -> DeliveryResult
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = String::new();

        for n in 1..=max_attempts {
            match attempt().await {
                Ok(()) => {
                    debug!(sink, attempt = n, "delivered");
                    return DeliveryResult::Delivered;
                }
                Err(e) => {
                    warn!(sink, attempt = n, max_attempts, error = %e, "delivery attempt failed");
                    last_error = e;
                    if n < max_attempts {
                        tokio::time::sleep(self.backoff(n)).await;
                    }
                }
            }
        }

        SentinelError::Delivery {
            adapter: sink.to_string(),
            reason: format!("{last_error} (after {max_attempts} attempts)"),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        };

        let result = policy
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("connection refused".to_string())
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert_eq!(result, DeliveryResult::Delivered);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        };
        let result = policy
            .run("test", || async { Err::<(), _>("550 mailbox unavailable".to_string()) })
            .await;
        assert_eq!(
            result,
            DeliveryResult::failed(
                "Delivery failed via test: 550 mailbox unavailable (after 2 attempts)"
            )
        );
    }

    #[test]
    fn test_errors_become_failed_results() {
        let exhausted = SentinelError::Delivery {
            adapter: "ops-email".to_string(),
            reason: "connection refused".to_string(),
        };
        match DeliveryResult::from(exhausted) {
            DeliveryResult::Failed { reason } => {
                assert_eq!(reason, "Delivery failed via ops-email: connection refused")
            }
            other => panic!("expected failure, got {other}"),
        }

        let bad_address = SentinelError::Smtp("invalid address: missing @".to_string());
        assert!(!DeliveryResult::from(bad_address).is_delivered());
    }
}
