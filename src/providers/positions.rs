//! Position-table reader
//!
//! Reads the open positions written by the trading department into a local
//! SQLite store. The store is opened read-only; the aggregator never writes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::domain::{HealthStatus, MetricSnapshot, Payload};
use crate::error::{Result, SentinelError};

use super::{settle, MetricProvider};

/// One row of the positions table
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRow {
    pub symbol: String,
    pub qty: Decimal,
    pub avg_entry_price: Decimal,
    pub market_value: Decimal,
    pub unrealized_pl: Decimal,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Provider over the `positions` table
pub struct PositionsProvider {
    source_id: String,
    pool: SqlitePool,
    table: String,
}

impl PositionsProvider {
    /// Open the store lazily in read-only mode; connection errors surface per fetch
    pub fn new(source_id: &str, database_path: impl AsRef<Path>, table: &str) -> Result<Self> {
        check_table_name(table)?;

        let options = SqliteConnectOptions::new()
            .filename(database_path.as_ref())
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(3))
            .connect_lazy_with(options);

        Self::from_pool(source_id, pool, table)
    }

    /// Wrap an existing pool
    pub fn from_pool(source_id: &str, pool: SqlitePool, table: &str) -> Result<Self> {
        check_table_name(table)?;

        Ok(Self {
            source_id: source_id.to_string(),
            pool,
            table: table.to_string(),
        })
    }

    async fn table_exists(&self) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?1",
        )
        .bind(&self.table)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get::<i64, _>("count")? > 0)
    }

    /// Read every open position
    #[instrument(skip(self), fields(source = %self.source_id))]
    pub async fn read_positions(&self) -> Result<Vec<PositionRow>> {
        let query = format!(
            r#"
            SELECT symbol,
                   CAST(qty AS REAL) AS qty,
                   CAST(avg_entry_price AS REAL) AS avg_entry_price,
                   CAST(market_value AS REAL) AS market_value,
                   CAST(unrealized_pl AS REAL) AS unrealized_pl,
                   CAST(updated_at AS TEXT) AS updated_at
            FROM {}
            ORDER BY symbol
            "#,
            self.table
        );

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|r| -> Result<PositionRow> {
                Ok(PositionRow {
                    symbol: r.try_get("symbol")?,
                    qty: to_decimal(r.try_get("qty")?),
                    avg_entry_price: to_decimal(r.try_get("avg_entry_price")?),
                    market_value: to_decimal(r.try_get("market_value")?),
                    unrealized_pl: to_decimal(r.try_get("unrealized_pl")?),
                    updated_at: r
                        .try_get::<Option<String>, _>("updated_at")?
                        .as_deref()
                        .and_then(parse_timestamp),
                })
            })
            .collect()
    }

    async fn collect(&self) -> Result<MetricSnapshot> {
        if !self.table_exists().await? {
            return Ok(MetricSnapshot::no_data(
                &self.source_id,
                format!("table '{}' does not exist", self.table),
            ));
        }

        let positions = self.read_positions().await?;
        debug!(count = positions.len(), "read positions");

        let payload = summarize(&positions);
        let last_activity = positions.iter().filter_map(|p| p.updated_at).max();
        let snapshot = MetricSnapshot::observed(&self.source_id, Utc::now(), payload)
            .with_last_activity(last_activity);

        // A flat book is a real zero reading; only timestamped rows are aged.
        Ok(if last_activity.is_some() {
            snapshot
        } else {
            snapshot.with_status(HealthStatus::Healthy)
        })
    }
}

#[async_trait]
impl MetricProvider for PositionsProvider {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch(&self) -> MetricSnapshot {
        settle(&self.source_id, self.collect().await)
    }
}

/// Aggregate position rows into the snapshot payload
pub fn summarize(positions: &[PositionRow]) -> Payload {
    let total_market_value: Decimal = positions.iter().map(|p| p.market_value).sum();
    let total_unrealized_pl: Decimal = positions.iter().map(|p| p.unrealized_pl).sum();
    let largest = positions
        .iter()
        .max_by(|a, b| a.market_value.abs().cmp(&b.market_value.abs()));

    let mut payload = Payload::new();
    payload.insert("position_count".into(), json!(positions.len()));
    payload.insert("total_market_value".into(), json!(money(total_market_value)));
    payload.insert("total_unrealized_pl".into(), json!(money(total_unrealized_pl)));
    payload.insert(
        "symbols".into(),
        json!(positions.iter().map(|p| p.symbol.as_str()).collect::<Vec<_>>()),
    );
    if let Some(largest) = largest {
        payload.insert("largest_position".into(), json!(largest.symbol));
    }
    payload
}

/// The table name is interpolated into SQL, so only plain identifiers pass
fn check_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(SentinelError::InvalidConfig(format!(
            "positions table '{}' is not a plain identifier",
            table
        )))
    }
}

fn to_decimal(value: Option<f64>) -> Decimal {
    value.and_then(Decimal::from_f64).unwrap_or(Decimal::ZERO)
}

fn money(value: Decimal) -> f64 {
    value.round_dp(2).to_f64().unwrap_or(0.0)
}

/// Accept RFC 3339 and SQLite's default `YYYY-MM-DD HH:MM:SS` (UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn row(symbol: &str, value: Decimal, pl: Decimal) -> PositionRow {
        PositionRow {
            symbol: symbol.to_string(),
            qty: dec!(10),
            avg_entry_price: dec!(1),
            market_value: value,
            unrealized_pl: pl,
            updated_at: None,
        }
    }

    #[test]
    fn test_summarize_totals() {
        let payload = summarize(&[
            row("AAPL", dec!(1905.10), dec!(-12.25)),
            row("TSLA", dec!(-2500.00), dec!(40.50)),
        ]);
        assert_eq!(payload["position_count"], json!(2));
        assert_eq!(payload["total_market_value"], json!(-594.9));
        assert_eq!(payload["total_unrealized_pl"], json!(28.25));
        assert_eq!(payload["largest_position"], json!("TSLA"));
    }

    #[test]
    fn test_summarize_empty_book() {
        let payload = summarize(&[]);
        assert_eq!(payload["position_count"], json!(0));
        assert!(!payload.contains_key("largest_position"));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 1, 5, 14, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2026-01-05T14:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2026-01-05 14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2026-01-05T09:30:00-05:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let result = PositionsProvider::new("positions", "/nonexistent.db", "x; DROP TABLE y");
        assert!(matches!(result, Err(SentinelError::InvalidConfig(_))));
    }
}
