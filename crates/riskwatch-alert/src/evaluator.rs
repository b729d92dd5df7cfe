use crate::filter::AlertFilters;
use crate::rules::{self, RecordView};
use crate::severity::{self, MatchedKinds};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use riskwatch_common::types::{AlertItem, RiskLevel, Rule, TaskRecord};
use std::cmp::Ordering;

const SECS_PER_DAY: i64 = 86_400;

/// Statuses treated as finished when no explicit list is configured.
pub const DEFAULT_TERMINAL_STATUSES: &[&str] = &["已完成", "完成", "已关闭", "已取消", "done", "completed", "closed", "cancelled"];

/// Inputs of an evaluation pass besides rules and records.
#[derive(Debug, Clone)]
pub struct EvalContext {
    /// Evaluation instant
    pub now: DateTime<Utc>,
    /// Business timezone in which record dates are interpreted
    pub utc_offset: FixedOffset,
    /// Statuses that exempt a record from the overdue rule (case-insensitive)
    pub terminal_statuses: Vec<String>,
}

impl EvalContext {
    pub fn new(now: DateTime<Utc>, utc_offset: FixedOffset) -> Self {
        Self {
            now,
            utc_offset,
            terminal_statuses: DEFAULT_TERMINAL_STATUSES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_terminal_statuses(mut self, statuses: Vec<String>) -> Self {
        self.terminal_statuses = statuses;
        self
    }

    pub fn is_terminal(&self, status: &str) -> bool {
        let status = status.trim();
        self.terminal_statuses.iter().any(|s| s.eq_ignore_ascii_case(status))
    }

    /// `ceil((end_date 00:00 local - now) / 1 day)`.
    ///
    /// `None` when local midnight of `end_date` cannot be represented as a
    /// UTC instant (dates at the edge of the supported range).
    pub fn days_left(&self, end_date: NaiveDate) -> Option<i64> {
        let local_midnight = end_date.and_time(NaiveTime::MIN).and_utc();
        let end = local_midnight
            .checked_sub_signed(Duration::seconds(i64::from(self.utc_offset.local_minus_utc())))?;
        let secs = (end - self.now).num_seconds();
        let days = secs.div_euclid(SECS_PER_DAY);
        if secs.rem_euclid(SECS_PER_DAY) > 0 {
            Some(days + 1)
        } else {
            Some(days)
        }
    }
}

/// Evaluates every enabled rule against every record, then applies the
/// display `filters`. Pure and deterministic for identical inputs.
pub fn evaluate(
    rules: &[Rule],
    records: &[TaskRecord],
    ctx: &EvalContext,
    filters: &AlertFilters,
) -> Vec<AlertItem> {
    let mut items = match_records(rules, records, ctx);
    if !filters.is_empty() {
        items.retain(|item| filters.accepts(item));
    }
    items
}

/// Unfiltered rule matching. Records on which no enabled rule fires are
/// left out. Output is sorted by `days_left` ascending (no end date last),
/// ties broken by `record_id`.
pub fn match_records(rules: &[Rule], records: &[TaskRecord], ctx: &EvalContext) -> Vec<AlertItem> {
    let active: Vec<&Rule> = rules.iter().filter(|r| r.enabled).collect();
    if active.is_empty() {
        return Vec::new();
    }

    let mut items = Vec::new();
    for record in records {
        let view = RecordView::parse(record, ctx);
        let mut matched = MatchedKinds::default();
        let mut keys = Vec::new();

        for rule in &active {
            if rules::matches(&rule.kind, record, &view, ctx) {
                matched.insert(rule.rule_type());
                keys.push(rule.key.clone());
            }
        }

        if matched.is_empty() {
            continue;
        }
        keys.sort();
        keys.dedup();

        let hint = record.risk_level_hint.as_deref().and_then(RiskLevel::from_hint);
        items.push(AlertItem {
            record_id: record.record_id.clone(),
            task_name: record.name.clone(),
            assignee: record.assignee.clone(),
            project: record.project.clone(),
            status: record.status.clone(),
            end_date: view.end_date,
            days_left: view.days_left,
            progress: view.progress,
            risk_level: severity::resolve(matched, hint),
            blocked: record.blocked.clone(),
            blocked_reason: record.blocked_reason.clone(),
            matched_rule_keys: keys,
        });
    }

    items.sort_by(|a, b| {
        cmp_days_left(a.days_left, b.days_left).then_with(|| a.record_id.cmp(&b.record_id))
    });
    items
}

fn cmp_days_left(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
