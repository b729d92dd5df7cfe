use crate::error::Result;
use crate::{AuditPersistence, AuditQuery, RulePersistence};
use riskwatch_common::types::{Rule, RuleChangeLogEntry};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Process-local store. Contents are lost on drop.
#[derive(Default)]
pub struct MemoryStore {
    rules: Mutex<BTreeMap<String, Rule>>,
    logs: Mutex<Vec<RuleChangeLogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RulePersistence for MemoryStore {
    fn load(&self) -> Result<Vec<Rule>> {
        let rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rules.values().cloned().collect())
    }

    fn save(&self, rule: &Rule) -> Result<()> {
        let mut rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        rules.insert(rule.key.clone(), rule.clone());
        Ok(())
    }
}

impl AuditPersistence for MemoryStore {
    fn append(&self, entry: &RuleChangeLogEntry) -> Result<()> {
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        logs.push(entry.clone());
        Ok(())
    }

    fn list(&self, query: &AuditQuery) -> Result<Vec<RuleChangeLogEntry>> {
        let logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        let matching: Vec<RuleChangeLogEntry> =
            logs.iter().filter(|e| query.matches(e)).cloned().collect();
        let skip = query
            .limit
            .map_or(0, |limit| matching.len().saturating_sub(limit));
        Ok(matching.into_iter().skip(skip).collect())
    }
}
