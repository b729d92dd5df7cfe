use riskwatch_common::types::{Blocked, TaskRecord};

/// 任务阻塞
///
/// Fires when the record's blocked field equals the configured value
/// exactly (case-sensitive). An unset or empty value is "not configured"
/// and never fires.
pub fn matches(settings: &Blocked, record: &TaskRecord) -> bool {
    let Some(expected) = settings.blocked_value.as_deref().filter(|v| !v.is_empty()) else {
        return false;
    };
    record.blocked.as_deref() == Some(expected)
}
