use crate::config::RuleDefaults;
use chrono::Utc;
use riskwatch_common::types::{Blocked, DeadlineProgress, Rule, RuleKind, RuleType};

/// Key under which each rule type is seeded. One rule instance per type.
pub fn rule_key(rule_type: RuleType) -> &'static str {
    rule_type.as_str()
}

fn rule_name(rule_type: RuleType) -> &'static str {
    match rule_type {
        RuleType::DeadlineProgress => "临期进度滞后",
        RuleType::Blocked => "任务阻塞",
        RuleType::Overdue => "任务逾期",
    }
}

/// Rules written on first startup. Keys that already exist in storage keep
/// their persisted configuration.
pub fn default_rules(defaults: &RuleDefaults) -> Vec<Rule> {
    let now = Utc::now();
    RuleType::ALL
        .iter()
        .map(|&rule_type| {
            let (kind, auto_notify) = match rule_type {
                RuleType::DeadlineProgress => (
                    RuleKind::DeadlineProgress(DeadlineProgress {
                        threshold_days: defaults.threshold_days,
                        progress_threshold: defaults.progress_threshold.min(100),
                        include_milestones: defaults.include_milestones,
                    }),
                    defaults.deadline_progress_auto_notify,
                ),
                RuleType::Blocked => (
                    RuleKind::Blocked(Blocked {
                        blocked_value: defaults
                            .blocked_value
                            .clone()
                            .filter(|v| !v.trim().is_empty()),
                    }),
                    defaults.blocked_auto_notify,
                ),
                RuleType::Overdue => (RuleKind::Overdue, defaults.overdue_auto_notify),
            };
            Rule {
                key: rule_key(rule_type).to_string(),
                name: rule_name(rule_type).to_string(),
                enabled: true,
                auto_notify,
                kind,
                updated_at: now,
            }
        })
        .collect()
}
