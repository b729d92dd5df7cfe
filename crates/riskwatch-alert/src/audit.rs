use riskwatch_common::types::RuleChangeLogEntry;
use riskwatch_storage::{AuditPersistence, AuditQuery, StorageError};
use std::sync::Arc;

/// Append-only history of rule configuration changes.
///
/// Only [`crate::store::RuleStore`] writes here. The log exposes no way to
/// edit or remove an entry.
pub struct RuleAuditLog {
    persistence: Arc<dyn AuditPersistence>,
}

impl RuleAuditLog {
    pub fn new(persistence: Arc<dyn AuditPersistence>) -> Self {
        Self { persistence }
    }

    pub fn append(&self, entry: &RuleChangeLogEntry) -> Result<(), StorageError> {
        self.persistence.append(entry)
    }

    /// Appends every entry, continuing past failures. Returns the first
    /// error, if any.
    pub fn append_all(&self, entries: &[RuleChangeLogEntry]) -> Result<(), StorageError> {
        let mut first_err = None;
        for entry in entries {
            if let Err(e) = self.persistence.append(entry) {
                tracing::warn!(entry_id = %entry.id, rule_key = %entry.rule_key, error = %e, "Change log append failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Entries matching `query`, oldest first.
    pub fn list(&self, query: &AuditQuery) -> Result<Vec<RuleChangeLogEntry>, StorageError> {
        self.persistence.list(query)
    }
}
