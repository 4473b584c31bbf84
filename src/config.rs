use chrono::NaiveTime;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::aggregator::ThresholdRule;
use crate::domain::{HealthStatus, Payload};
use crate::health::HealthThresholds;
use crate::render::Format;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    /// Default health-age cutoffs, overridable per provider
    #[serde(default)]
    pub health: HealthThresholds,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub rules: Vec<ThresholdRule>,
    #[serde(default)]
    pub alerts: AlertPolicyConfig,
    #[serde(default)]
    pub delivery: Vec<DeliveryConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Seconds between aggregation passes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Budget for a single provider fetch
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,
    /// Status server port (disabled when unset)
    #[serde(default)]
    pub status_port: Option<u16>,
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_provider_timeout() -> u64 {
    5
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            provider_timeout_secs: default_provider_timeout(),
            status_port: None,
        }
    }
}

/// One configured metric source
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Stable source identifier used as the report key
    pub id: String,
    /// Overrides `service.provider_timeout_secs`
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Overrides the global `[health]` cutoffs
    #[serde(default)]
    pub health: Option<HealthThresholds>,
    #[serde(flatten)]
    pub kind: ProviderKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderKind {
    /// Read-only SQLite positions table
    Positions {
        database_path: PathBuf,
        #[serde(default = "default_positions_table")]
        table: String,
    },
    /// Latest trade prices from the Alpaca market data API
    MarketPrice {
        symbols: Vec<String>,
        #[serde(default = "default_market_data_url")]
        base_url: String,
        #[serde(default = "default_key_id_env")]
        key_id_env: String,
        #[serde(default = "default_secret_key_env")]
        secret_key_env: String,
    },
    /// File-based department message directory
    DepartmentActivity {
        department: String,
        directory: PathBuf,
    },
    /// Fixed reading (smoke tests, placeholders)
    Static {
        #[serde(default)]
        payload: Payload,
        #[serde(default)]
        status: Option<HealthStatus>,
    },
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Positions { .. } => "positions",
            ProviderKind::MarketPrice { .. } => "market_price",
            ProviderKind::DepartmentActivity { .. } => "department_activity",
            ProviderKind::Static { .. } => "static",
        }
    }
}

fn default_positions_table() -> String {
    "positions".to_string()
}

fn default_market_data_url() -> String {
    "https://data.alpaca.markets".to_string()
}

fn default_key_id_env() -> String {
    "APCA_API_KEY_ID".to_string()
}

fn default_secret_key_env() -> String {
    "APCA_API_SECRET_KEY".to_string()
}

/// Cooldown and quiet-hours policy for alert deliveries
#[derive(Debug, Clone, Deserialize)]
pub struct AlertPolicyConfig {
    /// Cooldown applied to categories without an explicit entry
    #[serde(default = "default_cooldown_minutes")]
    pub default_cooldown_minutes: u64,
    /// Per-category cooldown in minutes
    #[serde(default)]
    pub cooldowns: BTreeMap<String, u64>,
    #[serde(default)]
    pub quiet_hours: Option<QuietHoursConfig>,
    /// Offset of the operator's wall clock from UTC, used for quiet hours
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Critical alerts still go out during quiet hours
    #[serde(default = "default_true")]
    pub critical_overrides_quiet_hours: bool,
    /// Raise a warning for sources that produced no data
    #[serde(default)]
    pub alert_on_no_data: bool,
}

/// Longest cooldown accepted for any alert category (one year)
pub const MAX_COOLDOWN_MINUTES: u64 = 366 * 24 * 60;

fn default_cooldown_minutes() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for AlertPolicyConfig {
    fn default() -> Self {
        Self {
            default_cooldown_minutes: default_cooldown_minutes(),
            cooldowns: BTreeMap::new(),
            quiet_hours: None,
            utc_offset_minutes: 0,
            critical_overrides_quiet_hours: true,
            alert_on_no_data: false,
        }
    }
}

/// Quiet-hours window as `HH:MM` wall-clock times; may wrap midnight
#[derive(Debug, Clone, Deserialize)]
pub struct QuietHoursConfig {
    pub start: String,
    pub end: String,
}

impl QuietHoursConfig {
    pub fn parse(&self) -> Result<(NaiveTime, NaiveTime), String> {
        let start = NaiveTime::parse_from_str(&self.start, "%H:%M")
            .map_err(|e| format!("quiet_hours.start '{}': {}", self.start, e))?;
        let end = NaiveTime::parse_from_str(&self.end, "%H:%M")
            .map_err(|e| format!("quiet_hours.end '{}': {}", self.end, e))?;
        Ok((start, end))
    }
}

/// What a delivery sink receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// The full rendered report, every pass
    #[default]
    Report,
    /// Individual alerts, subject to cooldown and quiet hours
    Alerts,
}

/// One configured delivery sink
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    pub name: String,
    #[serde(default)]
    pub purpose: Purpose,
    /// Report format this sink receives (ignored for alert sinks)
    #[serde(default = "default_format")]
    pub format: Format,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(flatten)]
    pub kind: DeliveryKind,
}

fn default_format() -> Format {
    Format::Markdown
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryKind {
    File {
        directory: PathBuf,
        #[serde(default = "default_file_prefix")]
        prefix: String,
        /// Keep only the newest N timestamped reports
        #[serde(default)]
        keep: Option<usize>,
    },
    Email {
        smtp: SmtpConfig,
        to: Vec<String>,
        #[serde(default = "default_subject_prefix")]
        subject_prefix: String,
    },
    /// Carrier email-to-SMS gateway addresses (e.g. `5551234567@vtext.com`)
    Sms {
        smtp: SmtpConfig,
        to: Vec<String>,
    },
    Webhook {
        url: String,
    },
    Stdout,
}

fn default_file_prefix() -> String {
    "sentinel_report".to_string()
}

fn default_subject_prefix() -> String {
    "[Sentinel]".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    /// Name of the environment variable holding the SMTP password
    #[serde(default = "default_smtp_password_env")]
    pub password_env: String,
    pub from: String,
    /// Use STARTTLS (false means a plain relay, e.g. localhost)
    #[serde(default = "default_true")]
    pub starttls: bool,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_password_env() -> String {
    "SENTINEL_SMTP_PASSWORD".to_string()
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for the daily rotating log file
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("service.refresh_interval_secs", default_refresh_interval())?
            .set_default("service.provider_timeout_secs", default_provider_timeout())?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SENTINEL_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (SENTINEL_SERVICE__STATUS_PORT, etc.)
            .add_source(
                Environment::with_prefix("SENTINEL")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load a single configuration file (plus environment overrides)
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("logging.level", "info")?
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("SENTINEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse configuration from an inline TOML string
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(raw, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Validate configuration values, reporting every problem found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.providers.is_empty() {
            errors.push("at least one [[providers]] entry is required".to_string());
        }

        if self.service.refresh_interval_secs == 0 {
            errors.push("service.refresh_interval_secs must be positive".to_string());
        }
        if self.service.provider_timeout_secs == 0 {
            errors.push("service.provider_timeout_secs must be positive".to_string());
        }

        if let Err(e) = self.health.validate() {
            errors.push(format!("health: {e}"));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                errors.push("provider id must not be empty".to_string());
            }
            if !seen.insert(provider.id.as_str()) {
                errors.push(format!("duplicate provider id '{}'", provider.id));
            }
            if provider.timeout_secs == Some(0) {
                errors.push(format!("provider '{}': timeout_secs must be positive", provider.id));
            }
            if let Some(ref health) = provider.health {
                if let Err(e) = health.validate() {
                    errors.push(format!("provider '{}': {e}", provider.id));
                }
            }
            match &provider.kind {
                ProviderKind::Positions { table, .. } => {
                    if !is_sql_identifier(table) {
                        errors.push(format!(
                            "provider '{}': table '{}' is not a plain identifier",
                            provider.id, table
                        ));
                    }
                }
                ProviderKind::MarketPrice { symbols, .. } => {
                    if symbols.is_empty() {
                        errors.push(format!("provider '{}': symbols must not be empty", provider.id));
                    }
                }
                ProviderKind::DepartmentActivity { .. } | ProviderKind::Static { .. } => {}
            }
        }

        for rule in &self.rules {
            if let Err(e) = rule.validate() {
                errors.push(format!("rule '{}': {e}", rule.name));
            }
            if !seen.contains(rule.source_id.as_str()) {
                errors.push(format!(
                    "rule '{}' references unknown provider '{}'",
                    rule.name, rule.source_id
                ));
            }
        }

        if let Some(ref quiet) = self.alerts.quiet_hours {
            if let Err(e) = quiet.parse() {
                errors.push(format!("alerts.{e}"));
            }
        }
        if self.alerts.default_cooldown_minutes > MAX_COOLDOWN_MINUTES {
            errors.push(format!(
                "alerts.default_cooldown_minutes must be at most {MAX_COOLDOWN_MINUTES}"
            ));
        }
        for (category, minutes) in &self.alerts.cooldowns {
            if *minutes > MAX_COOLDOWN_MINUTES {
                errors.push(format!(
                    "alerts.cooldowns.{category} must be at most {MAX_COOLDOWN_MINUTES} minutes"
                ));
            }
        }
        if self.alerts.utc_offset_minutes.abs() >= 24 * 60 {
            errors.push("alerts.utc_offset_minutes must be within one day".to_string());
        }

        let mut sink_names = HashSet::new();
        for sink in &self.delivery {
            if !sink_names.insert(sink.name.as_str()) {
                errors.push(format!("duplicate delivery name '{}'", sink.name));
            }
            if sink.retry.max_attempts == 0 {
                errors.push(format!("delivery '{}': retry.max_attempts must be >= 1", sink.name));
            }
            match &sink.kind {
                DeliveryKind::Sms { to, .. } => {
                    if sink.purpose != Purpose::Alerts {
                        errors.push(format!("delivery '{}': sms sinks only carry alerts", sink.name));
                    }
                    if to.is_empty() {
                        errors.push(format!("delivery '{}': no recipients", sink.name));
                    }
                }
                DeliveryKind::Email { to, .. } => {
                    if to.is_empty() {
                        errors.push(format!("delivery '{}': no recipients", sink.name));
                    }
                }
                DeliveryKind::File { .. } if sink.purpose == Purpose::Alerts => {
                    errors.push(format!("delivery '{}': file sinks only carry reports", sink.name));
                }
                _ => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Report formats needed by the configured report sinks
    pub fn report_formats(&self) -> Vec<Format> {
        let mut formats = Vec::new();
        for sink in self.delivery.iter().filter(|s| s.purpose == Purpose::Report) {
            if !formats.contains(&sink.format) {
                formats.push(sink.format);
            }
        }
        formats
    }
}

fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
