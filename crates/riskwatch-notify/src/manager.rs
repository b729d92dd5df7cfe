use crate::error::NotifyError;
use crate::NotificationChannel;
use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use riskwatch_common::types::{AlertItem, Rule};
use std::time::Duration;

/// Daily quiet hours in the business timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SilenceWindow {
    /// Parses `"HH:MM"` bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self, NotifyError> {
        let parse = |raw: &str| {
            NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                .map_err(|e| NotifyError::InvalidConfig(format!("silence window time '{raw}': {e}")))
        };
        Ok(Self {
            start: parse(start)?,
            end: parse(end)?,
        })
    }

    pub fn is_active(&self, local_time: NaiveTime) -> bool {
        if self.start <= self.end {
            local_time >= self.start && local_time <= self.end
        } else {
            // Overnight window (e.g., 22:00 - 08:00)
            local_time >= self.start || local_time <= self.end
        }
    }
}

/// Fans an alert out to every configured channel.
pub struct NotificationManager {
    channels: Vec<Box<dyn NotificationChannel>>,
    silence_windows: Vec<SilenceWindow>,
    send_timeout: Duration,
    utc_offset: FixedOffset,
}

impl NotificationManager {
    pub fn new(
        channels: Vec<Box<dyn NotificationChannel>>,
        silence_windows: Vec<SilenceWindow>,
        send_timeout: Duration,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            channels,
            silence_windows,
            send_timeout,
            utc_offset,
        }
    }

    /// True while any silence window covers `now` in local time.
    pub fn is_silenced(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.utc_offset).time();
        self.silence_windows.iter().any(|w| w.is_active(local))
    }

    /// Sends `alert` to every channel, each bounded by the send timeout.
    ///
    /// Succeeds if at least one channel delivered. A failing channel never
    /// prevents the others from being tried.
    pub async fn dispatch(&self, alert: &AlertItem, rule: &Rule) -> Result<(), NotifyError> {
        if self.channels.is_empty() {
            return Err(NotifyError::NoChannels);
        }

        let secs = self.send_timeout.as_secs();
        let mut delivered = 0usize;
        let mut timed_out = 0usize;
        let mut last_error = String::new();

        for channel in &self.channels {
            match tokio::time::timeout(self.send_timeout, channel.send(alert, rule)).await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::error!(
                        channel = channel.channel_name(),
                        record_id = %alert.record_id,
                        rule_key = %rule.key,
                        error = %e,
                        "Failed to send notification"
                    );
                    last_error = format!("{}: {e}", channel.channel_name());
                }
                Err(_) => {
                    tracing::error!(
                        channel = channel.channel_name(),
                        record_id = %alert.record_id,
                        rule_key = %rule.key,
                        timeout_secs = secs,
                        "Notification timed out"
                    );
                    timed_out += 1;
                    last_error = format!("{}: timed out after {secs}s", channel.channel_name());
                }
            }
        }

        if delivered > 0 {
            return Ok(());
        }
        if timed_out == self.channels.len() {
            return Err(NotifyError::Timeout { secs });
        }
        Err(NotifyError::AllChannelsFailed {
            attempted: self.channels.len(),
            last_error,
        })
    }

    pub fn channels(&self) -> &[Box<dyn NotificationChannel>] {
        &self.channels
    }
}
