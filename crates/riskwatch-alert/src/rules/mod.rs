//! Per-type match predicates.
//!
//! Each rule type lives in its own module and only sees the settings its
//! [`RuleKind`] variant carries. Dispatch is an exhaustive `match`, so a new
//! rule type does not compile until it has a predicate here.

pub mod blocked;
pub mod deadline_progress;
pub mod overdue;

use crate::evaluator::EvalContext;
use chrono::NaiveDate;
use riskwatch_common::parse::{parse_date, parse_progress};
use riskwatch_common::types::{RuleKind, TaskRecord};

/// Fields of a record parsed once per evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordView {
    pub end_date: Option<NaiveDate>,
    /// `None` when the end date is absent or unparseable
    pub days_left: Option<i64>,
    /// `None` when progress is absent or unparseable
    pub progress: Option<f64>,
}

impl RecordView {
    pub fn parse(record: &TaskRecord, ctx: &EvalContext) -> Self {
        // A date whose day count cannot be computed counts as unparseable
        let dated = record
            .end_date
            .as_ref()
            .and_then(|v| parse_date(v, ctx.utc_offset))
            .and_then(|d| ctx.days_left(d).map(|days| (d, days)));
        Self {
            end_date: dated.map(|(d, _)| d),
            days_left: dated.map(|(_, days)| days),
            progress: record.progress.as_ref().and_then(parse_progress),
        }
    }
}

/// Returns true when `kind` fires on `record`.
pub fn matches(kind: &RuleKind, record: &TaskRecord, view: &RecordView, ctx: &EvalContext) -> bool {
    match kind {
        RuleKind::DeadlineProgress(settings) => deadline_progress::matches(settings, record, view),
        RuleKind::Blocked(settings) => blocked::matches(settings, record),
        RuleKind::Overdue => overdue::matches(record, view, ctx),
    }
}
