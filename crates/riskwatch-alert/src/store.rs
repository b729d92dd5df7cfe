use crate::audit::RuleAuditLog;
use crate::error::RuleError;
use chrono::{DateTime, Utc};
use riskwatch_common::types::{Rule, RuleAction, RuleChangeLogEntry, RuleKind, RuleType};
use riskwatch_storage::RulePersistence;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Partial rule update. Absent fields are left unchanged.
///
/// Numeric fields are signed so that out-of-range input reaches validation
/// instead of failing deserialization. A blank `blocked_value` clears it;
/// any other value is stored verbatim, since blocked matching is exact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RulePatch {
    pub enabled: Option<bool>,
    pub auto_notify: Option<bool>,
    pub threshold_days: Option<i64>,
    pub progress_threshold: Option<i64>,
    pub include_milestones: Option<bool>,
    pub blocked_value: Option<String>,
}

impl RulePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Range checks that do not depend on the target rule.
    pub fn validate_ranges(&self) -> Result<(), RuleError> {
        if let Some(days) = self.threshold_days {
            if days < 0 || days > i64::from(u32::MAX) {
                return Err(RuleError::InvalidThreshold(days));
            }
        }
        if let Some(progress) = self.progress_threshold {
            if !(0..=100).contains(&progress) {
                return Err(RuleError::InvalidProgressThreshold(progress));
            }
        }
        Ok(())
    }
}

/// Published after every successful update that changed at least one field.
#[derive(Debug, Clone)]
pub struct RuleChange {
    pub rule: Rule,
    pub entries: Vec<RuleChangeLogEntry>,
}

struct FieldChange {
    action: RuleAction,
    note: String,
}

impl FieldChange {
    fn new(action: RuleAction, field: &str, before: impl Display, after: impl Display) -> Self {
        Self {
            action,
            note: format!("{field}: {before} → {after}"),
        }
    }
}

/// Live rule configuration.
///
/// The set of keys is fixed once the store is opened. Each rule sits behind
/// its own mutex, so updates to one key are serialized (including their
/// audit append) while other keys update independently.
pub struct RuleStore {
    slots: BTreeMap<String, Mutex<Rule>>,
    persistence: Arc<dyn RulePersistence>,
    audit: Arc<RuleAuditLog>,
    changes: broadcast::Sender<RuleChange>,
}

impl RuleStore {
    /// Loads persisted rules and seeds any `defaults` whose key is missing.
    pub fn open(
        persistence: Arc<dyn RulePersistence>,
        audit: Arc<RuleAuditLog>,
        defaults: Vec<Rule>,
    ) -> Result<Self, RuleError> {
        let mut slots = BTreeMap::new();
        for rule in persistence.load()? {
            slots.insert(rule.key.clone(), Mutex::new(rule));
        }

        for rule in defaults {
            if slots.contains_key(&rule.key) {
                continue;
            }
            persistence.save(&rule)?;
            tracing::info!(rule_key = %rule.key, rule_type = %rule.rule_type(), "Seeded default rule");
            slots.insert(rule.key.clone(), Mutex::new(rule));
        }

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            slots,
            persistence,
            audit,
            changes,
        })
    }

    /// All rules, ordered by key.
    pub fn get_all(&self) -> Vec<Rule> {
        self.slots
            .values()
            .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<Rule> {
        self.slots
            .get(key)
            .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    pub fn audit_log(&self) -> &Arc<RuleAuditLog> {
        &self.audit
    }

    /// Subscribes to successful rule changes.
    pub fn subscribe(&self) -> broadcast::Receiver<RuleChange> {
        self.changes.subscribe()
    }

    /// Validates and applies `patch` to the rule stored under `key`.
    ///
    /// The update is atomic: on any error the rule is unchanged and no log
    /// entry is written. Each changed field produces one log entry; all
    /// entries of one call share a timestamp. A failing audit append is
    /// logged and does not fail the update.
    pub fn update(&self, key: &str, patch: &RulePatch) -> Result<Rule, RuleError> {
        let slot = self
            .slots
            .get(key)
            .ok_or_else(|| RuleError::UnknownRuleKey(key.to_string()))?;
        patch.validate_ranges()?;

        let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = current.clone();
        let changes = apply_patch(&mut next, patch)?;
        if changes.is_empty() {
            return Ok(next);
        }

        let now = Utc::now();
        next.updated_at = now;
        self.persistence.save(&next)?;
        *current = next.clone();

        let entries = build_entries(key, changes, now);
        if let Err(e) = self.audit.append_all(&entries) {
            tracing::error!(rule_key = %key, error = %e, "Failed to append rule change log");
        }
        drop(current);

        tracing::info!(rule_key = %key, changed = entries.len(), "Rule updated");
        // No subscribers is fine
        let _ = self.changes.send(RuleChange {
            rule: next.clone(),
            entries,
        });
        Ok(next)
    }
}

fn build_entries(key: &str, changes: Vec<FieldChange>, now: DateTime<Utc>) -> Vec<RuleChangeLogEntry> {
    changes
        .into_iter()
        .map(|c| RuleChangeLogEntry {
            id: riskwatch_common::id::next_id(),
            rule_key: key.to_string(),
            action: c.action,
            note: c.note,
            created_at: now,
        })
        .collect()
}

fn not_applicable(field: &'static str, rule_type: RuleType) -> RuleError {
    RuleError::FieldNotApplicable { field, rule_type }
}

fn display_value(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("\"{v}\""),
        None => "(unset)".to_string(),
    }
}

/// Applies `patch` to `rule` in place and returns the changed fields.
/// Ranges must already be validated.
fn apply_patch(rule: &mut Rule, patch: &RulePatch) -> Result<Vec<FieldChange>, RuleError> {
    let rule_type = rule.rule_type();
    let mut changes = Vec::new();

    if let Some(enabled) = patch.enabled {
        if enabled != rule.enabled {
            let action = if enabled {
                RuleAction::Enabled
            } else {
                RuleAction::Disabled
            };
            changes.push(FieldChange::new(action, "enabled", rule.enabled, enabled));
            rule.enabled = enabled;
        }
    }

    match &mut rule.kind {
        RuleKind::DeadlineProgress(settings) => {
            if patch.blocked_value.is_some() {
                return Err(not_applicable("blockedValue", rule_type));
            }
            if let Some(days) = patch.threshold_days {
                let days = u32::try_from(days).map_err(|_| RuleError::InvalidThreshold(days))?;
                if days != settings.threshold_days {
                    changes.push(FieldChange::new(
                        RuleAction::ThresholdUpdated,
                        "thresholdDays",
                        settings.threshold_days,
                        days,
                    ));
                    settings.threshold_days = days;
                }
            }
            if let Some(progress) = patch.progress_threshold {
                let progress = u8::try_from(progress)
                    .map_err(|_| RuleError::InvalidProgressThreshold(progress))?;
                if progress != settings.progress_threshold {
                    changes.push(FieldChange::new(
                        RuleAction::ThresholdUpdated,
                        "progressThreshold",
                        settings.progress_threshold,
                        progress,
                    ));
                    settings.progress_threshold = progress;
                }
            }
            if let Some(include) = patch.include_milestones {
                if include != settings.include_milestones {
                    changes.push(FieldChange::new(
                        RuleAction::MilestoneScopeUpdated,
                        "includeMilestones",
                        settings.include_milestones,
                        include,
                    ));
                    settings.include_milestones = include;
                }
            }
        }
        RuleKind::Blocked(settings) => {
            reject_deadline_fields(patch, rule_type)?;
            if let Some(raw) = &patch.blocked_value {
                let value = Some(raw.as_str()).filter(|v| !v.trim().is_empty()).map(str::to_string);
                if value != settings.blocked_value {
                    changes.push(FieldChange::new(
                        RuleAction::BlockedValueUpdated,
                        "blockedValue",
                        display_value(settings.blocked_value.as_deref()),
                        display_value(value.as_deref()),
                    ));
                    settings.blocked_value = value;
                }
            }
        }
        RuleKind::Overdue => {
            reject_deadline_fields(patch, rule_type)?;
            if patch.blocked_value.is_some() {
                return Err(not_applicable("blockedValue", rule_type));
            }
        }
    }

    if let Some(auto_notify) = patch.auto_notify {
        if auto_notify != rule.auto_notify {
            changes.push(FieldChange::new(
                RuleAction::AutoNotifyToggled,
                "autoNotify",
                rule.auto_notify,
                auto_notify,
            ));
            rule.auto_notify = auto_notify;
        }
    }

    Ok(changes)
}

fn reject_deadline_fields(patch: &RulePatch, rule_type: RuleType) -> Result<(), RuleError> {
    if patch.threshold_days.is_some() {
        return Err(not_applicable("thresholdDays", rule_type));
    }
    if patch.progress_threshold.is_some() {
        return Err(not_applicable("progressThreshold", rule_type));
    }
    if patch.include_milestones.is_some() {
        return Err(not_applicable("includeMilestones", rule_type));
    }
    Ok(())
}
