use thiserror::Error;

/// Main error type for the aggregator
#[derive(Error, Debug)]
pub enum SentinelError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Provider store errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP error: {0}")]
    Smtp(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Assembly errors
    #[error("No metric providers configured; refusing to assemble an empty report")]
    NoProviders,

    #[error("Duplicate provider source_id: {0}")]
    DuplicateSource(String),

    // Rendering / delivery
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Delivery failed via {adapter}: {reason}")]
    Delivery { adapter: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for SentinelError
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Errors surfaced by a single report format.
///
/// A render failure only affects the format that produced it; the other
/// formats of the same pass are still rendered and delivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Malformed report: {0}")]
    Malformed(String),

    #[error("{format} encoding failed: {reason}")]
    Encoding { format: String, reason: String },
}

impl From<lettre::error::Error> for SentinelError {
    fn from(err: lettre::error::Error) -> Self {
        SentinelError::Smtp(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for SentinelError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        SentinelError::Smtp(err.to_string())
    }
}

impl From<lettre::address::AddressError> for SentinelError {
    fn from(err: lettre::address::AddressError) -> Self {
        SentinelError::Smtp(format!("invalid address: {}", err))
    }
}
