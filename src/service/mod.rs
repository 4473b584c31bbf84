//! Aggregation service
//!
//! Owns the assembler, the report sinks and the alert dispatcher. Passes are
//! single-flight: the polling loop and on-demand triggers share one lock, so
//! two passes never read the providers at the same time.

pub mod shutdown;
pub mod status_server;

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregator::{AssemblerConfig, SnapshotAssembler};
use crate::config::AppConfig;
use crate::delivery::{build_sinks, DeliveryAdapter, DeliveryResult, GatePolicy};
use crate::domain::AggregatedReport;
use crate::error::{Result, SentinelError};
use crate::providers::build_providers;
use crate::render::{render_all, Format, RenderContext};
use crate::supervisor::{AlertDispatcher, DispatchOutcome};

pub use shutdown::{install_signal_handlers, Shutdown, ShutdownSignal, ShutdownToken};
pub use status_server::{StatusServer, StatusState};

/// Latest complete report, `None` until the first pass finishes
pub type LatestReport = watch::Receiver<Option<Arc<AggregatedReport>>>;

/// Everything one pass produced
#[derive(Debug)]
pub struct PassOutcome {
    pub report: Arc<AggregatedReport>,
    /// (sink, result) for each report sink
    pub deliveries: Vec<(String, DeliveryResult)>,
    pub alerts: Vec<DispatchOutcome>,
}

impl PassOutcome {
    pub fn failed_deliveries(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|(_, r)| matches!(r, DeliveryResult::Failed { .. }))
            .count()
    }
}

pub struct AggregationService {
    assembler: SnapshotAssembler,
    report_sinks: Vec<Arc<dyn DeliveryAdapter>>,
    dispatcher: AlertDispatcher,
    interval: Duration,
    pass_lock: Mutex<()>,
    latest_tx: watch::Sender<Option<Arc<AggregatedReport>>>,
    trigger_tx: mpsc::Sender<()>,
    trigger_rx: Mutex<mpsc::Receiver<()>>,
}

impl AggregationService {
    pub fn new(
        assembler: SnapshotAssembler,
        report_sinks: Vec<Arc<dyn DeliveryAdapter>>,
        dispatcher: AlertDispatcher,
        interval: Duration,
    ) -> Self {
        let (latest_tx, _) = watch::channel(None);
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        Self {
            assembler,
            report_sinks,
            dispatcher,
            interval,
            pass_lock: Mutex::new(()),
            latest_tx,
            trigger_tx,
            trigger_rx: Mutex::new(trigger_rx),
        }
    }

    /// Wire providers, sinks and policies from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let providers = build_providers(config)?;
        let assembler = SnapshotAssembler::new(providers, AssemblerConfig::from_app_config(config));
        let sinks = build_sinks(config)?;
        let dispatcher = AlertDispatcher::new(GatePolicy::from_config(&config.alerts)?, sinks.alerts);

        Ok(Self::new(
            assembler,
            sinks.reports,
            dispatcher,
            Duration::from_secs(config.service.refresh_interval_secs),
        ))
    }

    pub fn latest(&self) -> LatestReport {
        self.latest_tx.subscribe()
    }

    /// Handle that queues an on-demand pass in the running loop
    pub fn trigger_handle(&self) -> mpsc::Sender<()> {
        self.trigger_tx.clone()
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.assembler.source_ids()
    }

    /// Run one pass now, waiting for any pass already in flight
    pub async fn trigger(&self) -> Result<PassOutcome> {
        let _pass = self.pass_lock.lock().await;
        let report = Arc::new(self.assembler.assemble().await?);
        Ok(self.publish_and_deliver(report).await)
    }

    /// Run one pass, discarding it if shutdown fires before the report is complete
    #[instrument(skip_all)]
    pub async fn run_pass(&self, shutdown: &mut ShutdownToken) -> Result<PassOutcome> {
        let _pass = self.pass_lock.lock().await;

        let report = tokio::select! {
            biased;
            signal = shutdown.wait() => {
                warn!(%signal, "shutdown during aggregation; pass discarded");
                return Err(SentinelError::Cancelled);
            }
            report = self.assembler.assemble() => Arc::new(report?),
        };

        Ok(self.publish_and_deliver(report).await)
    }

    async fn publish_and_deliver(&self, report: Arc<AggregatedReport>) -> PassOutcome {
        self.latest_tx.send_replace(Some(Arc::clone(&report)));

        let deliveries = self.deliver_report(&report).await;
        let alerts = self.dispatcher.dispatch(&report.alerts).await;

        let outcome = PassOutcome {
            report,
            deliveries,
            alerts,
        };
        info!(
            pass_id = %outcome.report.pass_id,
            overall = %outcome.report.overall_status(),
            deliveries = outcome.deliveries.len(),
            failed = outcome.failed_deliveries(),
            alerts = outcome.alerts.len(),
            "pass delivered"
        );
        outcome
    }

    /// Render each needed format once, then deliver to every report sink concurrently
    async fn deliver_report(&self, report: &AggregatedReport) -> Vec<(String, DeliveryResult)> {
        if self.report_sinks.is_empty() {
            return Vec::new();
        }

        let mut formats: Vec<Format> = Vec::new();
        for sink in &self.report_sinks {
            if !formats.contains(&sink.format()) {
                formats.push(sink.format());
            }
        }
        let rendered = render_all(report, &formats, &RenderContext::now());

        join_all(self.report_sinks.iter().map(|sink| {
            let document = rendered
                .iter()
                .find(|(format, _)| *format == sink.format())
                .map(|(_, doc)| doc);
            async move {
                let result = match document {
                    Some(Ok(doc)) => sink.deliver(doc).await,
                    Some(Err(e)) => DeliveryResult::failed(format!("render failed: {e}")),
                    None => DeliveryResult::failed("no document rendered"),
                };
                if let DeliveryResult::Failed { ref reason } = result {
                    error!(sink = %sink.name(), %reason, "report delivery failed");
                }
                (sink.name().to_string(), result)
            }
        }))
        .await
    }

    /// Poll until shutdown. Passes run on the interval and on trigger.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        let mut trigger_rx = self.trigger_rx.lock().await;
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = self.interval.as_secs(),
            sources = ?self.assembler.source_ids(),
            report_sinks = self.report_sinks.len(),
            alert_sinks = self.dispatcher.sink_count(),
            "aggregation loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = ticker.tick() => debug!("scheduled pass"),
                Some(()) = trigger_rx.recv() => debug!("on-demand pass"),
            }

            match self.run_pass(&mut shutdown).await {
                Ok(_) => {}
                Err(SentinelError::Cancelled) => break,
                // Only an unusable provider set gets here; it will not fix itself
                Err(e @ (SentinelError::NoProviders | SentinelError::DuplicateSource(_))) => {
                    error!(error = %e, "aggregation aborted");
                    return Err(e);
                }
                Err(e) => error!(error = %e, "aggregation pass failed"),
            }
        }

        info!("aggregation loop stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HealthStatus, Payload};
    use crate::providers::{MetricProvider, StaticProvider};
    use crate::render::RenderedDocument;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        format: Format,
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl DeliveryAdapter for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn format(&self) -> Format {
            self.format
        }

        async fn deliver(&self, document: &RenderedDocument) -> DeliveryResult {
            assert_eq!(document.format, self.format);
            self.delivered.fetch_add(1, Ordering::SeqCst);
            DeliveryResult::Delivered
        }
    }

    fn provider(id: &str, delay_ms: u64) -> Arc<dyn MetricProvider> {
        let mut payload = Payload::new();
        payload.insert("value".into(), json!(1));
        Arc::new(StaticProvider::new(id, payload).with_delay(Duration::from_millis(delay_ms)))
    }

    fn service(providers: Vec<Arc<dyn MetricProvider>>, sink: Arc<Counting>) -> AggregationService {
        AggregationService::new(
            SnapshotAssembler::new(providers, AssemblerConfig::default()),
            vec![sink as Arc<dyn DeliveryAdapter>],
            AlertDispatcher::new(GatePolicy::default(), Vec::new()),
            Duration::from_secs(300),
        )
    }

    fn counting(format: Format) -> Arc<Counting> {
        Arc::new(Counting {
            format,
            delivered: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_trigger_publishes_and_delivers() {
        let sink = counting(Format::Json);
        let service = service(vec![provider("orders", 0)], Arc::clone(&sink));
        let latest = service.latest();
        assert!(latest.borrow().is_none());

        let outcome = service.trigger().await.unwrap();
        assert_eq!(outcome.deliveries, vec![("counting".to_string(), DeliveryResult::Delivered)]);
        assert_eq!(sink.delivered.load(Ordering::SeqCst), 1);

        let published = latest.borrow().clone().unwrap();
        assert_eq!(published.pass_id, outcome.report.pass_id);
        assert_eq!(published.overall_status(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_passes_do_not_overlap() {
        let sink = counting(Format::Markdown);
        let service = Arc::new(service(vec![provider("slow", 100)], Arc::clone(&sink)));

        let started = std::time::Instant::now();
        let (a, b) = tokio::join!(service.trigger(), service.trigger());
        assert!(a.is_ok() && b.is_ok());
        // Two serialized 100ms passes
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(sink.delivered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_discards_pass() {
        let sink = counting(Format::Html);
        let service = service(vec![provider("slow", 5_000)], Arc::clone(&sink));
        let shutdown = Shutdown::new();
        let mut token = shutdown.token();

        let pass = service.run_pass(&mut token);
        tokio::pin!(pass);
        tokio::select! {
            _ = &mut pass => panic!("pass should still be running"),
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
        shutdown.request(ShutdownSignal::Graceful);

        assert!(matches!(pass.await, Err(SentinelError::Cancelled)));
        assert_eq!(sink.delivered.load(Ordering::SeqCst), 0);
        assert!(service.latest().borrow().is_none());
    }

    #[tokio::test]
    async fn test_run_loop_stops_on_shutdown() {
        let sink = counting(Format::Terminal);
        let service = Arc::new(service(vec![provider("orders", 0)], Arc::clone(&sink)));
        let shutdown = Shutdown::new();

        let handle = {
            let service = Arc::clone(&service);
            let token = shutdown.token();
            tokio::spawn(async move { service.run(token).await })
        };

        // First tick fires immediately
        tokio::time::sleep(Duration::from_millis(50)).await;
        service.trigger_handle().send(()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown.request(ShutdownSignal::Graceful);
        handle.await.unwrap().unwrap();
        assert_eq!(sink.delivered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_provider_set_aborts_loop() {
        let sink = counting(Format::Json);
        let service = service(Vec::new(), sink);
        let shutdown = Shutdown::new();
        assert!(matches!(
            service.run(shutdown.token()).await,
            Err(SentinelError::NoProviders)
        ));
    }
}
