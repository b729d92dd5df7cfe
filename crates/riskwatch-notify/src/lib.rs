//! Notification delivery for risk alerts.
//!
//! An [`AlertItem`] matched by an auto-notify rule is handed to
//! [`manager::NotificationManager::dispatch`], which fans it out to every
//! configured [`NotificationChannel`] with a per-channel timeout. Built-in
//! channels are a generic webhook (chat-bot compatible) and a log channel.

pub mod channels;
pub mod error;
pub mod manager;
pub mod template;
pub mod utils;


pub use error::NotifyError;
pub use manager::{NotificationManager, SilenceWindow};

use anyhow::Result;
use async_trait::async_trait;
use riskwatch_common::types::{AlertItem, Rule};

/// A notification delivery channel that sends risk alerts to an external
/// service (chat-bot webhook, log sink, ...).
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers one alert raised by `rule`.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails after retries (if applicable).
    async fn send(&self, alert: &AlertItem, rule: &Rule) -> Result<()>;

    /// Returns the configured channel name (e.g., `"feishu-pm"`, `"log"`).
    fn channel_name(&self) -> &str;
}
