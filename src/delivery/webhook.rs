//! Chat webhook sink (Feishu/Lark text message shape)

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

use crate::domain::Alert;
use crate::render::{Format, RenderedDocument};

use super::{DeliveryAdapter, DeliveryResult, RetryPolicy};

#[derive(Serialize)]
struct WebhookMessage<'a> {
    msg_type: &'static str,
    content: WebhookContent<'a>,
}

#[derive(Serialize)]
struct WebhookContent<'a> {
    text: &'a str,
}

/// Posts text messages to a chat bot webhook
pub struct WebhookSink {
    name: String,
    format: Format,
    client: Client,
    url: String,
    retry: RetryPolicy,
}

impl WebhookSink {
    pub fn new(name: &str, format: Format, url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            name: name.to_string(),
            format,
            client,
            url: url.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send a text message
    pub async fn send_message(&self, text: &str) -> Result<(), String> {
        let message = WebhookMessage {
            msg_type: "text",
            content: WebhookContent { text },
        };

        match self.client.post(&self.url).json(&message).send().await {
            Ok(resp) => {
                if resp.status().is_success() {
                    debug!(sink = %self.name, "webhook message sent");
                    Ok(())
                } else {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    error!(sink = %self.name, "webhook rejected message: {} - {}", status, body);
                    Err(format!("HTTP {}: {}", status, body))
                }
            }
            Err(e) => {
                error!(sink = %self.name, "webhook request failed: {}", e);
                Err(e.to_string())
            }
        }
    }

    async fn send_with_retry(&self, text: &str) -> DeliveryResult {
        self.retry
            .run(&self.name, || self.send_message(text))
            .await
    }
}

#[async_trait]
impl DeliveryAdapter for WebhookSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> Format {
        self.format
    }

    async fn deliver(&self, document: &RenderedDocument) -> DeliveryResult {
        let text = format!("{}\n\n{}", document.title(), document.content);
        self.send_with_retry(&text).await
    }

    async fn notify(&self, alert: &Alert) -> DeliveryResult {
        let text = format!(
            "{} {}\nTime: {}",
            alert.severity.emoji(),
            alert.headline(),
            alert.detected_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        self.send_with_retry(&text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/hook", addr)
    }

    #[tokio::test]
    async fn test_alert_posts_text_message() {
        let received = Arc::new(Mutex::new(Vec::<serde_json::Value>::new()));
        let store = Arc::clone(&received);
        let app = Router::new().route(
            "/hook",
            post(move |Json(body): Json<serde_json::Value>| {
                let store = Arc::clone(&store);
                async move {
                    store.lock().unwrap().push(body);
                    StatusCode::OK
                }
            }),
        );
        let url = serve(app).await;

        let sink = WebhookSink::new("chat", Format::Markdown, &url);
        let alert = Alert::new(Severity::Critical, "positions", "daily_pnl", "loss limit", Utc::now());
        assert_eq!(sink.notify(&alert).await, DeliveryResult::Delivered);

        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["msg_type"], "text");
        let text = bodies[0]["content"]["text"].as_str().unwrap();
        assert!(text.contains("[CRITICAL] positions: loss limit"));
    }

    #[tokio::test]
    async fn test_server_error_is_failed() {
        let app = Router::new().route("/hook", post(|| async { StatusCode::BAD_GATEWAY }));
        let url = serve(app).await;

        let sink = WebhookSink::new("chat", Format::Markdown, &url).with_retry(RetryPolicy::none());
        let alert = Alert::new(Severity::Warning, "market", "health:market", "degraded", Utc::now());
        match sink.notify(&alert).await {
            DeliveryResult::Failed { reason } => assert!(reason.contains("502")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
