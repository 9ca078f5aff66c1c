//! Best-effort push notifications to a Feishu/Lark webhook.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use crate::error::NotifyError;
use crate::metrics;

pub mod mock;

pub use mock::RecordingNotifier;

/// Destination for operator-facing messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` once. Callers log failures and never retry.
    async fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// Log `message` at error level and push it to the notifier.
///
/// Delivery failures are logged and counted, never retried.
pub async fn alert(notifier: &dyn Notifier, message: &str) {
    error!("{}", message);
    if let Err(e) = notifier.notify(message).await {
        metrics::inc_notifications_failed();
        warn!(error = %e, "Failed to deliver notification");
    }
}

/// Text message body understood by Feishu custom bots.
#[derive(Debug, Serialize)]
pub struct TextMessage<'a> {
    /// Always "text".
    pub msg_type: &'static str,
    /// Message content.
    pub content: TextContent<'a>,
}

/// Content of a [`TextMessage`].
#[derive(Debug, Serialize)]
pub struct TextContent<'a> {
    /// Message text.
    pub text: &'a str,
}

impl<'a> TextMessage<'a> {
    /// Wrap `text` in the webhook envelope.
    pub fn new(text: &'a str) -> Self {
        Self {
            msg_type: "text",
            content: TextContent { text },
        }
    }
}

/// Posts messages to a Feishu webhook URL.
#[derive(Debug, Clone)]
pub struct FeishuNotifier {
    http: reqwest::Client,
    webhook: String,
}

impl FeishuNotifier {
    /// Create a notifier with its own HTTP client.
    pub fn new(webhook: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            webhook: webhook.into(),
        })
    }
}

#[async_trait]
impl Notifier for FeishuNotifier {
    #[instrument(skip(self, message))]
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let start = Instant::now();
        let response = self
            .http
            .post(&self.webhook)
            .json(&TextMessage::new(message))
            .send()
            .await?;
        metrics::record_http_latency(start, "webhook");

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Notification delivered");
        Ok(())
    }
}

/// Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(&self, _message: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_shape() {
        let json = serde_json::to_value(TextMessage::new("cycle failed")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"msg_type": "text", "content": {"text": "cycle failed"}})
        );
    }

    #[tokio::test]
    async fn alert_swallows_delivery_failures() {
        let notifier = RecordingNotifier::failing();
        alert(&notifier, "cycle failed").await;
        assert_eq!(notifier.messages(), vec!["cycle failed"]);
    }

    #[tokio::test]
    async fn disabled_notifier_accepts_everything() {
        tokio_test::assert_ok!(DisabledNotifier.notify("ignored").await);
    }
}
