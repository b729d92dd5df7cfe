//! Durable storage for risk rules and the rule change log.
//!
//! [`sqlite::SqliteRuleStore`] keeps both in a single SQLite database with
//! WAL mode; [`memory::MemoryStore`] is a process-local implementation for
//! tests and dry runs. The change log table is append-only: SQLite triggers
//! reject any `UPDATE` or `DELETE`.

pub mod error;
pub mod memory;
pub mod sqlite;


pub use error::{Result, StorageError};
pub use memory::MemoryStore;
pub use sqlite::SqliteRuleStore;

use riskwatch_common::types::{Rule, RuleAction, RuleChangeLogEntry};

/// Persistence backend for rule configuration.
///
/// Implementations must be safe to share across threads because rules are
/// read by the HTTP layer and the notification scheduler concurrently.
pub trait RulePersistence: Send + Sync {
    /// Loads every stored rule, ordered by key.
    fn load(&self) -> Result<Vec<Rule>>;

    /// Inserts or replaces the rule stored under `rule.key`.
    fn save(&self, rule: &Rule) -> Result<()>;
}

/// Append-only persistence for rule change log entries.
///
/// There is deliberately no way to modify or remove an entry.
pub trait AuditPersistence: Send + Sync {
    /// Appends one entry after all previously appended entries.
    fn append(&self, entry: &RuleChangeLogEntry) -> Result<()>;

    /// Lists entries matching `query` in insertion order.
    fn list(&self, query: &AuditQuery) -> Result<Vec<RuleChangeLogEntry>>;
}

/// Filter for change log reads.
///
/// # Examples
///
/// ```
/// use riskwatch_common::types::RuleAction;
/// use riskwatch_storage::AuditQuery;
///
/// let query = AuditQuery {
///     rule_key: Some("deadline_progress".into()),
///     action: Some(RuleAction::ThresholdUpdated),
///     limit: Some(50),
/// };
/// assert!(query.matches_key_and_action("deadline_progress", RuleAction::ThresholdUpdated));
/// assert!(!query.matches_key_and_action("blocked", RuleAction::ThresholdUpdated));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub rule_key: Option<String>,
    pub action: Option<RuleAction>,
    /// Keep only the most recent `limit` matching entries (still returned
    /// oldest first).
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn matches_key_and_action(&self, rule_key: &str, action: RuleAction) -> bool {
        self.rule_key.as_deref().map_or(true, |k| k == rule_key)
            && self.action.map_or(true, |a| a == action)
    }

    pub fn matches(&self, entry: &RuleChangeLogEntry) -> bool {
        self.matches_key_and_action(&entry.rule_key, entry.action)
    }
}
