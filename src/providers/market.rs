//! Latest trade prices from the Alpaca market data API

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::domain::{HealthStatus, MetricSnapshot, Payload};
use crate::error::{Result, SentinelError};

use super::{settle, MetricProvider};

const KEY_ID_HEADER: &str = "APCA-API-KEY-ID";
const SECRET_KEY_HEADER: &str = "APCA-API-SECRET-KEY";

/// API credentials
#[derive(Clone)]
pub struct AlpacaCredentials {
    pub key_id: String,
    pub secret_key: String,
}

impl AlpacaCredentials {
    /// Read both keys from the named environment variables
    pub fn from_env(key_id_env: &str, secret_key_env: &str) -> Option<Self> {
        let key_id = std::env::var(key_id_env).ok().filter(|v| !v.is_empty())?;
        let secret_key = std::env::var(secret_key_env).ok().filter(|v| !v.is_empty())?;
        Some(Self { key_id, secret_key })
    }
}

impl std::fmt::Debug for AlpacaCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlpacaCredentials")
            .field("key_id", &self.key_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct LatestTradeResponse {
    trade: Trade,
}

#[derive(Debug, Deserialize)]
struct Trade {
    #[serde(rename = "t")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "p")]
    price: f64,
}

/// One symbol's outcome
#[derive(Debug)]
struct Quote {
    symbol: String,
    latency_ms: u64,
    result: Result<Trade>,
}

/// Provider over `/v2/stocks/{symbol}/trades/latest`
pub struct MarketPriceProvider {
    source_id: String,
    client: Client,
    base_url: String,
    symbols: Vec<String>,
    credentials: Option<AlpacaCredentials>,
}

impl MarketPriceProvider {
    pub fn new(
        source_id: &str,
        base_url: &str,
        symbols: Vec<String>,
        credentials: Option<AlpacaCredentials>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            source_id: source_id.to_string(),
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            symbols,
            credentials,
        }
    }

    async fn latest_trade(&self, symbol: &str, credentials: &AlpacaCredentials) -> Quote {
        let started = Instant::now();
        let url = format!("{}/v2/stocks/{}/trades/latest", self.base_url, symbol);

        let result = async {
            let resp = self
                .client
                .get(&url)
                .header(KEY_ID_HEADER, &credentials.key_id)
                .header(SECRET_KEY_HEADER, &credentials.secret_key)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(SentinelError::Internal(format!("HTTP {}: {}", status, body)));
            }

            let latest: LatestTradeResponse = resp.json().await?;
            Ok(latest.trade)
        }
        .await;

        Quote {
            symbol: symbol.to_string(),
            latency_ms: started.elapsed().as_millis() as u64,
            result,
        }
    }

    #[instrument(skip(self), fields(source = %self.source_id, symbols = self.symbols.len()))]
    async fn collect(&self) -> Result<MetricSnapshot> {
        let Some(credentials) = &self.credentials else {
            return Ok(MetricSnapshot::no_data(
                &self.source_id,
                "market data credentials not configured",
            ));
        };

        let quotes = join_all(
            self.symbols
                .iter()
                .map(|symbol| self.latest_trade(symbol, credentials)),
        )
        .await;

        Ok(summarize_quotes(&self.source_id, quotes, Utc::now()))
    }
}

fn summarize_quotes(source_id: &str, quotes: Vec<Quote>, captured_at: DateTime<Utc>) -> MetricSnapshot {
    let mut prices = BTreeMap::new();
    let mut failed = Vec::new();
    let mut last_trade: Option<DateTime<Utc>> = None;
    let latencies: Vec<u64> = quotes.iter().map(|q| q.latency_ms).collect();

    for quote in quotes {
        match quote.result {
            Ok(trade) => {
                debug!(symbol = %quote.symbol, price = trade.price, "latest trade");
                prices.insert(quote.symbol, json!(trade.price));
                last_trade = last_trade.max(Some(trade.timestamp));
            }
            Err(e) => {
                warn!(symbol = %quote.symbol, error = %e, "price fetch failed");
                failed.push(quote.symbol);
            }
        }
    }

    if prices.is_empty() {
        return MetricSnapshot::no_data(
            source_id,
            format!("no prices fetched ({} symbols failed)", failed.len()),
        );
    }

    let avg_latency = latencies.iter().sum::<u64>() / latencies.len().max(1) as u64;
    let max_latency = latencies.iter().copied().max().unwrap_or(0);
    let status = if failed.is_empty() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    let mut payload = Payload::new();
    payload.insert("prices".into(), json!(prices));
    payload.insert("latency_ms".into(), json!(avg_latency));
    payload.insert("max_latency_ms".into(), json!(max_latency));
    payload.insert("symbols_failed".into(), json!(failed));

    MetricSnapshot::observed(source_id, captured_at, payload)
        .with_last_activity(last_trade)
        .with_status(status)
}

#[async_trait]
impl MetricProvider for MarketPriceProvider {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch(&self) -> MetricSnapshot {
        settle(&self.source_id, self.collect().await)
    }
}
