use std::sync::Arc;
use tracing::info;

use crate::config::{AppConfig, DeliveryConfig, DeliveryKind, Purpose};
use crate::error::Result;

use super::{
    DeliveryAdapter, EmailSink, FileSink, RetryPolicy, SmsSink, SmtpMailer, StdoutSink, WebhookSink,
};

/// Configured sinks, split by what they carry
#[derive(Clone, Default)]
pub struct Sinks {
    pub reports: Vec<Arc<dyn DeliveryAdapter>>,
    pub alerts: Vec<Arc<dyn DeliveryAdapter>>,
}

impl Sinks {
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty() && self.alerts.is_empty()
    }
}

/// Instantiate every `[[delivery]]` entry
pub fn build_sinks(config: &AppConfig) -> Result<Sinks> {
    let mut sinks = Sinks::default();
    for cfg in &config.delivery {
        let sink = build_sink(cfg)?;
        info!(sink = %cfg.name, purpose = ?cfg.purpose, format = %cfg.format, "delivery sink configured");
        match cfg.purpose {
            Purpose::Report => sinks.reports.push(sink),
            Purpose::Alerts => sinks.alerts.push(sink),
        }
    }
    Ok(sinks)
}

fn build_sink(cfg: &DeliveryConfig) -> Result<Arc<dyn DeliveryAdapter>> {
    let retry = RetryPolicy::from(cfg.retry);
    let sink: Arc<dyn DeliveryAdapter> = match &cfg.kind {
        DeliveryKind::File {
            directory,
            prefix,
            keep,
        } => Arc::new(
            FileSink::new(&cfg.name, cfg.format, directory.clone(), prefix)
                .with_retention(*keep)
                .with_retry(retry),
        ),
        DeliveryKind::Email {
            smtp,
            to,
            subject_prefix,
        } => Arc::new(
            EmailSink::new(
                &cfg.name,
                cfg.format,
                SmtpMailer::from_config(smtp)?,
                to,
                subject_prefix,
            )?
            .with_retry(retry),
        ),
        DeliveryKind::Sms { smtp, to } => {
            Arc::new(SmsSink::new(&cfg.name, SmtpMailer::from_config(smtp)?, to)?.with_retry(retry))
        }
        DeliveryKind::Webhook { url } => {
            Arc::new(WebhookSink::new(&cfg.name, cfg.format, url).with_retry(retry))
        }
        DeliveryKind::Stdout => Arc::new(StdoutSink::new(&cfg.name, cfg.format)),
    };
    Ok(sink)
}
