//! Metric providers
//!
//! Each provider wraps one external system (position store, market data API,
//! department message directory) and is the only code that speaks that
//! system's protocol. Providers never fail: any internal error becomes a
//! NoData snapshot carrying the reason in `payload.error`.

pub mod activity;
pub mod factory;
pub mod market;
pub mod positions;
pub mod static_source;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::MetricSnapshot;
use crate::error::Result;

pub use activity::DepartmentActivityProvider;
pub use factory::build_providers;
pub use market::MarketPriceProvider;
pub use positions::PositionsProvider;
pub use static_source::StaticProvider;

/// A source of one [`MetricSnapshot`] per aggregation pass
#[async_trait]
pub trait MetricProvider: Send + Sync {
    /// Stable identifier used as the report key
    fn source_id(&self) -> &str;

    /// Produce a snapshot. Must not fail; errors are reported as NoData.
    async fn fetch(&self) -> MetricSnapshot;
}

/// Convert a fallible collection into the never-failing provider contract
pub(crate) fn settle(source_id: &str, result: Result<MetricSnapshot>) -> MetricSnapshot {
    match result {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(source = source_id, error = %e, "provider fetch failed");
            MetricSnapshot::no_data(source_id, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HealthStatus;
    use crate::error::SentinelError;

    #[test]
    fn test_settle_converts_errors() {
        let snap = settle(
            "positions",
            Err(SentinelError::Internal("no such table".into())),
        );
        assert_eq!(snap.status, HealthStatus::NoData);
        assert_eq!(snap.source_id, "positions");
        assert_eq!(snap.error(), Some("Internal error: no such table"));
    }
}
