use crate::error::NotifyError;
use crate::template::{fill_placeholders, render_message};
use crate::utils::{truncate_string, MAX_BODY_LENGTH};
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use riskwatch_common::types::{AlertItem, Rule};
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts alerts as JSON to a webhook URL.
///
/// Without a `body_template` the payload is the chat-bot text message shape
/// `{"msg_type":"text","content":{"text":...}}`.
pub struct WebhookChannel {
    name: String,
    url: String,
    client: reqwest::Client,
    body_template: Option<String>,
}

impl WebhookChannel {
    pub fn new(name: &str, url: &str, body_template: Option<String>) -> Result<Self, NotifyError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| NotifyError::InvalidConfig(format!("webhook '{name}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(NotifyError::InvalidConfig(format!(
                "webhook '{name}': url must be http(s), got '{}'",
                parsed.scheme()
            )));
        }
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            client,
            body_template,
        })
    }

    /// Request body for `alert`. A filled `body_template` must be valid JSON.
    pub fn render_body(&self, alert: &AlertItem, rule: &Rule) -> Result<String, NotifyError> {
        match &self.body_template {
            Some(template) => {
                let body = fill_placeholders(template, alert, rule);
                serde_json::from_str::<serde_json::Value>(&body)?;
                Ok(body)
            }
            None => Ok(serde_json::json!({
                "msg_type": "text",
                "content": { "text": render_message(alert, rule) },
            })
            .to_string()),
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, alert: &AlertItem, rule: &Rule) -> Result<()> {
        // A broken template fails the same way on every attempt
        let body = self.render_body(alert, rule)?;
        let mut last_err = None;

        for attempt in 0..MAX_ATTEMPTS {
            match self
                .client
                .post(self.url.as_str())
                .header("Content-Type", "application/json")
                .body(body.clone())
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        tracing::debug!(channel = %self.name, record_id = %alert.record_id, "Webhook delivered");
                        return Ok(());
                    }
                    let resp_body = match resp.text().await {
                        Ok(text) => truncate_string(&text, MAX_BODY_LENGTH),
                        Err(e) => format!("[Failed to read response body: {e}]"),
                    };
                    tracing::warn!(
                        channel = %self.name,
                        attempt = attempt + 1,
                        status = %status,
                        "Webhook returned non-success status, retrying"
                    );
                    last_err = Some(anyhow::anyhow!("HTTP {status}: {resp_body}"));
                }
                Err(e) => {
                    tracing::warn!(
                        channel = %self.name,
                        attempt = attempt + 1,
                        error = %e,
                        "Webhook send failed, retrying"
                    );
                    last_err = Some(e.into());
                }
            }
            if attempt + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
            }
        }

        let err = last_err.unwrap_or_else(|| anyhow::anyhow!("webhook not attempted"));
        tracing::error!(channel = %self.name, error = %err, "Webhook failed after {MAX_ATTEMPTS} attempts");
        Err(err)
    }

    fn channel_name(&self) -> &str {
        &self.name
    }
}
