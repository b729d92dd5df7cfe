use crate::template::render_message;
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use riskwatch_common::types::{AlertItem, Rule};

/// Writes notifications to the application log. Useful as a fallback sink
/// and in environments without a chat webhook.
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, alert: &AlertItem, rule: &Rule) -> Result<()> {
        tracing::info!(
            record_id = %alert.record_id,
            rule_key = %rule.key,
            risk_level = %alert.risk_level,
            message = %render_message(alert, rule),
            "Risk notification"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
