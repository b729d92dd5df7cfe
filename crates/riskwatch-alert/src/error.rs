use riskwatch_common::types::RuleType;
use riskwatch_storage::StorageError;

/// Errors returned by rule configuration operations.
///
/// # Examples
///
/// ```rust
/// use riskwatch_alert::RuleError;
///
/// let err = RuleError::InvalidThreshold(-1);
/// assert!(err.is_validation());
/// assert!(err.to_string().contains("-1"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// The key does not name a configured rule.
    #[error("Rule: unknown rule key '{0}'")]
    UnknownRuleKey(String),

    #[error("Rule: thresholdDays must be >= 0, got {0}")]
    InvalidThreshold(i64),

    #[error("Rule: progressThreshold must be within 0..=100, got {0}")]
    InvalidProgressThreshold(i64),

    /// The patch sets a field that the rule's type does not carry.
    #[error("Rule: field '{field}' does not apply to {rule_type} rules")]
    FieldNotApplicable {
        field: &'static str,
        rule_type: RuleType,
    },

    /// Loading or saving rule configuration failed.
    #[error("Rule: persistence failed: {0}")]
    Persistence(#[from] StorageError),
}

impl RuleError {
    /// True for user-correctable input errors.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RuleError::InvalidThreshold(_)
                | RuleError::InvalidProgressThreshold(_)
                | RuleError::FieldNotApplicable { .. }
        )
    }
}
