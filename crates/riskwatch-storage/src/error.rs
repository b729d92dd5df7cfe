/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use riskwatch_storage::StorageError;
///
/// let err = StorageError::Corrupt {
///     table: "risk_rule_logs",
///     detail: "unknown rule action: renamed".to_string(),
/// };
/// assert!(err.to_string().contains("risk_rule_logs"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failure of a rule payload.
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The data directory could not be created or opened.
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row could not be mapped back to a domain value.
    #[error("Storage: corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
