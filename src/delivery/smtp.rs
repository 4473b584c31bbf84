//! SMTP-backed sinks: email reports and carrier email-to-SMS alerts

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use crate::config::SmtpConfig;
use crate::domain::Alert;
use crate::error::{Result, SentinelError};
use crate::render::{Format, RenderedDocument};

use super::{DeliveryAdapter, DeliveryResult, RetryPolicy};

/// Longest text a carrier gateway reliably forwards as one message
pub const SMS_MAX_CHARS: usize = 160;

/// Shared SMTP transport and sender address
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(cfg: &SmtpConfig) -> Result<Self> {
        let mut builder = if cfg.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.host)
        };
        builder = builder.port(cfg.port);

        if let Some(ref username) = cfg.username {
            let password = std::env::var(&cfg.password_env).unwrap_or_else(|_| {
                warn!(env = %cfg.password_env, "SMTP password not set");
                String::new()
            });
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }

        Ok(Self {
            transport: builder.build(),
            from: cfg.from.parse()?,
        })
    }

    /// Build the message without sending it
    pub fn compose(
        &self,
        to: &[Mailbox],
        subject: &str,
        content_type: ContentType,
        body: String,
    ) -> Result<Message> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in to {
            builder = builder.to(recipient.clone());
        }
        Ok(builder.header(content_type).body(body)?)
    }

    pub async fn send(&self, message: Message) -> Result<()> {
        self.transport.send(message).await?;
        Ok(())
    }
}

fn parse_recipients(to: &[String]) -> Result<Vec<Mailbox>> {
    if to.is_empty() {
        return Err(SentinelError::InvalidConfig("no recipients".to_string()));
    }
    to.iter()
        .map(|addr| addr.parse::<Mailbox>().map_err(SentinelError::from))
        .collect()
}

/// Emails rendered reports
pub struct EmailSink {
    name: String,
    format: Format,
    mailer: SmtpMailer,
    to: Vec<Mailbox>,
    subject_prefix: String,
    retry: RetryPolicy,
}

impl EmailSink {
    pub fn new(
        name: &str,
        format: Format,
        mailer: SmtpMailer,
        to: &[String],
        subject_prefix: &str,
    ) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            format,
            mailer,
            to: parse_recipients(to)?,
            subject_prefix: subject_prefix.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn subject(&self, text: &str) -> String {
        if self.subject_prefix.is_empty() {
            text.to_string()
        } else {
            format!("{} {}", self.subject_prefix, text)
        }
    }

    fn report_message(&self, document: &RenderedDocument) -> Result<Message> {
        let content_type = match document.format {
            Format::Html => ContentType::TEXT_HTML,
            _ => ContentType::TEXT_PLAIN,
        };
        let mut subject = document.title();
        if document.critical_alerts > 0 {
            subject.push_str(&format!(" ({} critical)", document.critical_alerts));
        }
        self.mailer.compose(
            &self.to,
            &self.subject(&subject),
            content_type,
            document.content.clone(),
        )
    }

    fn alert_message(&self, alert: &Alert) -> Result<Message> {
        let body = format!(
            "{}\n\nSource: {}\nCategory: {}\nDetected: {}\n",
            alert.message,
            alert.source_id,
            alert.category,
            alert.detected_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        self.mailer.compose(
            &self.to,
            &self.subject(&alert.headline()),
            ContentType::TEXT_PLAIN,
            body,
        )
    }

    async fn send_with_retry(&self, message: Message) -> DeliveryResult {
        self.retry
            .run(&self.name, || {
                let message = message.clone();
                async move { self.mailer.send(message).await.map_err(|e| e.to_string()) }
            })
            .await
    }
}

#[async_trait]
impl DeliveryAdapter for EmailSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> Format {
        self.format
    }

    async fn deliver(&self, document: &RenderedDocument) -> DeliveryResult {
        let message = match self.report_message(document) {
            Ok(m) => m,
            Err(e) => return e.into(),
        };
        let result = self.send_with_retry(message).await;
        if result.is_delivered() {
            info!(sink = %self.name, recipients = self.to.len(), "report emailed");
        }
        result
    }

    async fn notify(&self, alert: &Alert) -> DeliveryResult {
        match self.alert_message(alert) {
            Ok(message) => self.send_with_retry(message).await,
            Err(e) => e.into(),
        }
    }
}

/// Short text alerts through carrier email-to-SMS gateways
pub struct SmsSink {
    name: String,
    mailer: SmtpMailer,
    to: Vec<Mailbox>,
    retry: RetryPolicy,
}

impl SmsSink {
    pub fn new(name: &str, mailer: SmtpMailer, to: &[String]) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            mailer,
            to: parse_recipients(to)?,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn send_text(&self, text: &str) -> DeliveryResult {
        let message = match self.mailer.compose(
            &self.to,
            "Sentinel",
            ContentType::TEXT_PLAIN,
            truncate_sms(text),
        ) {
            Ok(m) => m,
            Err(e) => return e.into(),
        };

        self.retry
            .run(&self.name, || {
                let message = message.clone();
                async move { self.mailer.send(message).await.map_err(|e| e.to_string()) }
            })
            .await
    }
}

/// Clip to [`SMS_MAX_CHARS`], marking the cut with `...`
pub fn truncate_sms(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= SMS_MAX_CHARS {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(SMS_MAX_CHARS - 3).collect();
    clipped.push_str("...");
    clipped
}

#[async_trait]
impl DeliveryAdapter for SmsSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> Format {
        Format::Terminal
    }

    /// Only the one-line summary of a report fits in a text message
    async fn deliver(&self, document: &RenderedDocument) -> DeliveryResult {
        let mut text = document.title();
        if document.critical_alerts > 0 {
            text.push_str(&format!(", {} critical", document.critical_alerts));
        }
        self.send_text(&text).await
    }

    async fn notify(&self, alert: &Alert) -> DeliveryResult {
        let result = self
            .send_text(&format!("{} {}", alert.severity.emoji(), alert.headline()))
            .await;
        if result.is_delivered() {
            info!(sink = %self.name, category = %alert.category, "sms alert sent");
        }
        result
    }
}
