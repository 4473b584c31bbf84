pub mod aggregator;
pub mod cli;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod error;
pub mod health;
pub mod providers;
pub mod render;
pub mod service;
pub mod supervisor;
pub mod tui;

pub use aggregator::{AssemblerConfig, SnapshotAssembler};
pub use config::AppConfig;
pub use delivery::{DeliveryAdapter, DeliveryResult};
pub use domain::{AggregatedReport, Alert, HealthStatus, MetricSnapshot, Severity};
pub use error::{RenderError, Result, SentinelError};
pub use providers::MetricProvider;
pub use render::{render, Format, RenderContext, RenderedDocument};
pub use service::{AggregationService, Shutdown, ShutdownSignal};
