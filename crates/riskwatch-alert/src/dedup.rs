use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Key: (record_id, rule_key)
type DedupKey = (String, String);

#[derive(Debug, Clone, Copy)]
struct DedupState {
    first_seen_at: DateTime<Utc>,
    notified_at: Option<DateTime<Utc>>,
}

/// Snapshot of one tracked condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupEntry {
    pub record_id: String,
    pub rule_key: String,
    pub first_seen_at: DateTime<Utc>,
    pub notified_at: Option<DateTime<Utc>>,
}

/// Remembers which (record, rule) conditions have already been notified so
/// that a condition persisting across passes notifies once per onset.
///
/// State is process-local. Only the scheduled notification path touches it.
#[derive(Default)]
pub struct NotificationDedupTracker {
    entries: Mutex<HashMap<DedupKey, DedupState>>,
}

impl NotificationDedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DedupKey, DedupState>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true exactly once per onset: the first call for an untracked
    /// pair records it and returns true, later calls return false until the
    /// pair is cleared.
    pub fn should_notify(&self, record_id: &str, rule_key: &str) -> bool {
        let mut entries = self.lock();
        let key = (record_id.to_string(), rule_key.to_string());
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(
            key,
            DedupState {
                first_seen_at: Utc::now(),
                notified_at: None,
            },
        );
        true
    }

    /// Records a successful delivery for the pair.
    pub fn mark_notified(&self, record_id: &str, rule_key: &str) {
        let now = Utc::now();
        let mut entries = self.lock();
        entries
            .entry((record_id.to_string(), rule_key.to_string()))
            .and_modify(|state| state.notified_at = Some(now))
            .or_insert(DedupState {
                first_seen_at: now,
                notified_at: Some(now),
            });
    }

    /// Forgets the pair: the condition no longer holds, or its delivery
    /// must be retried. Returns true if the pair was tracked.
    pub fn clear(&self, record_id: &str, rule_key: &str) -> bool {
        self.lock()
            .remove(&(record_id.to_string(), rule_key.to_string()))
            .is_some()
    }

    /// Clears every pair of `rule_key` whose record is not in `active`.
    /// Returns the number of pairs removed.
    pub fn retain_active(&self, rule_key: &str, active: &HashSet<&str>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(record_id, key), _| key != rule_key || active.contains(record_id.as_str()));
        before - entries.len()
    }

    /// Clears every pair of `rule_key`. Returns the number removed.
    pub fn clear_rule(&self, rule_key: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(_, key), _| key != rule_key);
        before - entries.len()
    }

    pub fn contains(&self, record_id: &str, rule_key: &str) -> bool {
        self.lock()
            .contains_key(&(record_id.to_string(), rule_key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// All tracked pairs, ordered by (rule_key, record_id).
    pub fn entries(&self) -> Vec<DedupEntry> {
        let mut out: Vec<DedupEntry> = self
            .lock()
            .iter()
            .map(|((record_id, rule_key), state)| DedupEntry {
                record_id: record_id.clone(),
                rule_key: rule_key.clone(),
                first_seen_at: state.first_seen_at,
                notified_at: state.notified_at,
            })
            .collect();
        out.sort_by(|a, b| (&a.rule_key, &a.record_id).cmp(&(&b.rule_key, &b.record_id)));
        out
    }
}
