use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::domain::Alert;
use crate::render::{Format, RenderedDocument};

use super::{DeliveryAdapter, DeliveryResult};

/// Prints documents and alerts to standard output
pub struct StdoutSink {
    name: String,
    format: Format,
}

impl StdoutSink {
    pub fn new(name: &str, format: Format) -> Self {
        Self {
            name: name.to_string(),
            format,
        }
    }

    async fn write(&self, text: &str) -> DeliveryResult {
        let mut out = tokio::io::stdout();
        let written = async {
            out.write_all(text.as_bytes()).await?;
            if !text.ends_with('\n') {
                out.write_all(b"\n").await?;
            }
            out.flush().await
        }
        .await;

        match written {
            Ok(()) => DeliveryResult::Delivered,
            Err(e) => DeliveryResult::failed(e.to_string()),
        }
    }
}

#[async_trait]
impl DeliveryAdapter for StdoutSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> Format {
        self.format
    }

    async fn deliver(&self, document: &RenderedDocument) -> DeliveryResult {
        self.write(&document.content).await
    }

    async fn notify(&self, alert: &Alert) -> DeliveryResult {
        self.write(&alert.headline()).await
    }
}
