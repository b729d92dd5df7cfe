/// Errors that can occur within the notification subsystem.
///
/// Channel implementations return `anyhow::Result`; the manager folds their
/// failures into [`NotifyError::AllChannelsFailed`].
///
/// # Examples
///
/// ```rust
/// use riskwatch_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("webhook url must be http(s)".to_string());
/// assert!(err.to_string().contains("http(s)"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required field or contains an invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// No channel is configured, so nothing can be delivered.
    #[error("Notify: no notification channels configured")]
    NoChannels,

    /// Every channel exceeded the send timeout.
    #[error("Notify: delivery timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Every channel failed. `last_error` is the last failure observed.
    #[error("Notify: all {attempted} channel(s) failed, last error: {last_error}")]
    AllChannelsFailed { attempted: usize, last_error: String },

    /// Building an HTTP client or request failed.
    #[error("Notify: HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// A filled webhook body template is not valid JSON.
    #[error("Notify: JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
