use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::aggregator::{AssemblerConfig, SnapshotAssembler};
use crate::config::AppConfig;
use crate::delivery::build_sinks;
use crate::domain::HealthStatus;
use crate::providers::build_providers;
use crate::render::{render, Format, RenderContext};
use crate::service::{
    install_signal_handlers, AggregationService, PassOutcome, Shutdown, ShutdownSignal, StatusServer,
    StatusState,
};
use crate::tui::DashboardRunner;

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(author = "Sentinel Team")]
#[command(version)]
#[command(about = "Health & performance snapshot aggregator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (defaults to config/default.toml + config/$SENTINEL_ENV.toml)
    #[arg(short, long, global = true, env = "SENTINEL_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll providers and deliver reports until stopped
    Run,
    /// Run a single aggregation pass
    Once {
        /// Print the report to stdout in this format
        #[arg(short, long)]
        format: Option<Format>,
        /// Also deliver to the configured sinks and alert channels
        #[arg(long)]
        deliver: bool,
        /// Exit non-zero when any source is unhealthy
        #[arg(long)]
        fail_on_unhealthy: bool,
    },
    /// Live terminal dashboard (runs the polling loop in the background)
    Dashboard,
    /// Validate configuration and list what would be built
    CheckConfig,
}

impl Commands {
    /// Dashboard owns the terminal, so console logging must stay off
    pub fn is_tui(&self) -> bool {
        matches!(self, Commands::Dashboard)
    }
}

/// Load configuration from `--config` or the layered defaults
pub fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::load().context("loading config from config/")?,
    };
    Ok(config)
}

fn ensure_valid(config: &AppConfig) -> anyhow::Result<()> {
    if let Err(problems) = config.validate() {
        for problem in &problems {
            error!("config: {}", problem);
        }
        bail!("configuration has {} problem(s)", problems.len());
    }
    Ok(())
}

pub async fn run_service(config: AppConfig) -> anyhow::Result<()> {
    ensure_valid(&config)?;
    let service = Arc::new(AggregationService::from_config(&config)?);

    let shutdown = Arc::new(Shutdown::new());
    install_signal_handlers(Arc::clone(&shutdown));

    let status = config.service.status_port.map(|port| {
        let state = StatusState::new(service.latest(), service.trigger_handle());
        let token = shutdown.token();
        tokio::spawn(async move {
            if let Err(e) = StatusServer::new(state, port).run(token).await {
                error!("Status server failed: {}", e);
            }
        })
    });

    let result = service.run(shutdown.token()).await;
    // The loop may stop on its own (fatal provider set); take the server down with it
    shutdown.request(ShutdownSignal::Graceful);
    if let Some(handle) = status {
        let _ = handle.await;
    }
    result?;
    Ok(())
}

pub async fn run_once(
    config: AppConfig,
    format: Option<Format>,
    deliver: bool,
    fail_on_unhealthy: bool,
) -> anyhow::Result<()> {
    ensure_valid(&config)?;

    let outcome = if deliver {
        AggregationService::from_config(&config)?.trigger().await?
    } else {
        let assembler = SnapshotAssembler::new(
            build_providers(&config)?,
            AssemblerConfig::from_app_config(&config),
        );
        PassOutcome {
            report: Arc::new(assembler.assemble().await?),
            deliveries: Vec::new(),
            alerts: Vec::new(),
        }
    };

    if let Some(format) = format {
        let doc = render(&outcome.report, format, &RenderContext::now())?;
        let mut out = tokio::io::stdout();
        out.write_all(doc.content.as_bytes()).await?;
        if !doc.content.ends_with('\n') {
            out.write_all(b"\n").await?;
        }
        out.flush().await?;
    }

    for (sink, result) in &outcome.deliveries {
        info!(%sink, %result, "delivery");
    }

    let overall = outcome.report.overall_status();
    if outcome.failed_deliveries() > 0 {
        warn!(failed = outcome.failed_deliveries(), "some deliveries failed");
    }
    if fail_on_unhealthy && overall == HealthStatus::Unhealthy {
        bail!("overall status is {}", overall.label());
    }
    Ok(())
}

pub async fn run_dashboard(config: AppConfig) -> anyhow::Result<()> {
    ensure_valid(&config)?;
    let service = Arc::new(AggregationService::from_config(&config)?);

    let shutdown = Arc::new(Shutdown::new());
    install_signal_handlers(Arc::clone(&shutdown));

    let poller = {
        let service = Arc::clone(&service);
        let token = shutdown.token();
        tokio::spawn(async move { service.run(token).await })
    };

    let runner = DashboardRunner::new(
        service.latest(),
        service.trigger_handle(),
        Arc::clone(&shutdown),
    );
    let dashboard = runner.run().await;

    shutdown.request(ShutdownSignal::Graceful);
    match poller.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("aggregation loop failed: {}", e),
        Err(e) => error!("aggregation loop panicked: {}", e),
    }
    dashboard?;
    Ok(())
}

/// Print a summary of the configuration; exit non-zero on problems
pub fn check_config(config: &AppConfig) -> anyhow::Result<()> {
    let problems = config.validate().err().unwrap_or_default();

    println!("Providers ({}):", config.providers.len());
    for provider in &config.providers {
        println!("  - {:<20} {}", provider.id, provider.kind.name());
    }
    println!("Rules ({}):", config.rules.len());
    for rule in &config.rules {
        println!("  - {:<20} {} ({})", rule.name, rule.source_id, rule.severity);
    }
    println!("Delivery ({}):", config.delivery.len());
    for sink in &config.delivery {
        println!("  - {:<20} {:?} as {}", sink.name, sink.purpose, sink.format);
    }

    if problems.is_empty() {
        // Constructing sinks also checks addresses and SMTP hosts
        build_sinks(config)?;
        println!("\nConfiguration OK");
        return Ok(());
    }

    println!("\nProblems:");
    for problem in &problems {
        println!("  x {}", problem);
    }
    bail!("configuration has {} problem(s)", problems.len())
}
