use super::RecordView;
use crate::evaluator::EvalContext;
use riskwatch_common::types::TaskRecord;

/// 任务逾期
///
/// Fires when the end date has passed and the status is not terminal.
pub fn matches(record: &TaskRecord, view: &RecordView, ctx: &EvalContext) -> bool {
    let Some(days_left) = view.days_left else {
        return false;
    };
    days_left < 0 && !record.status.as_deref().is_some_and(|s| ctx.is_terminal(s))
}
