//! Severity resolution.
//!
//! The level of an alert item is `max(hint, escalation(matched))`, where the
//! escalation table below is the only place that maps fired rule types to a
//! level.

use riskwatch_common::types::{RiskLevel, RuleType};

/// Set of rule types that fired on one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchedKinds {
    pub deadline_progress: bool,
    pub blocked: bool,
    pub overdue: bool,
}

impl MatchedKinds {
    pub fn insert(&mut self, rule_type: RuleType) {
        match rule_type {
            RuleType::DeadlineProgress => self.deadline_progress = true,
            RuleType::Blocked => self.blocked = true,
            RuleType::Overdue => self.overdue = true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.deadline_progress || self.blocked || self.overdue)
    }
}

/// Level implied by the fired rule types alone.
///
/// | overdue | deadline_progress | blocked | level  |
/// |---------|-------------------|---------|--------|
/// | yes     | any               | any     | high   |
/// | no      | yes               | any     | medium |
/// | no      | no                | yes     | low    |
/// | no      | no                | no      | unset  |
pub fn escalation(matched: MatchedKinds) -> Option<RiskLevel> {
    match (matched.overdue, matched.deadline_progress, matched.blocked) {
        (true, _, _) => Some(RiskLevel::High),
        (false, true, _) => Some(RiskLevel::Medium),
        (false, false, true) => Some(RiskLevel::Low),
        (false, false, false) => None,
    }
}

/// Final level of a qualifying record: the higher of the record's own hint
/// and the escalation. A record with neither is `low`.
pub fn resolve(matched: MatchedKinds, hint: Option<RiskLevel>) -> RiskLevel {
    escalation(matched).max(hint).unwrap_or(RiskLevel::Low)
}
