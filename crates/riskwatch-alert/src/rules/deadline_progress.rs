use super::RecordView;
use riskwatch_common::types::{DeadlineProgress, TaskRecord};

/// 临期进度滞后
///
/// Fires when the record is due within `threshold_days` (inclusive) and its
/// progress is still below `progress_threshold`. A record without a usable
/// end date is skipped. Missing or unparseable progress counts as 0 so it
/// can only raise risk.
pub fn matches(settings: &DeadlineProgress, record: &TaskRecord, view: &RecordView) -> bool {
    if record.is_milestone && !settings.include_milestones {
        return false;
    }
    let Some(days_left) = view.days_left else {
        return false;
    };
    let progress = view.progress.unwrap_or(0.0);
    days_left <= i64::from(settings.threshold_days) && progress < f64::from(settings.progress_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(include_milestones: bool) -> DeadlineProgress {
        DeadlineProgress {
            threshold_days: 7,
            progress_threshold: 80,
            include_milestones,
        }
    }

    fn view(days_left: Option<i64>, progress: Option<f64>) -> RecordView {
        RecordView {
            end_date: None,
            days_left,
            progress,
        }
    }

    #[test]
    fn fires_inside_window_with_low_progress() {
        let record = TaskRecord::default();
        assert!(matches(&settings(true), &record, &view(Some(3), Some(50.0))));
        assert!(matches(&settings(true), &record, &view(Some(7), Some(79.9))));
        assert!(matches(&settings(true), &record, &view(Some(-4), Some(10.0))));
    }

    #[test]
    fn boundaries_are_inclusive_on_days_exclusive_on_progress() {
        let record = TaskRecord::default();
        assert!(!matches(&settings(true), &record, &view(Some(8), Some(0.0))));
        assert!(!matches(&settings(true), &record, &view(Some(3), Some(80.0))));
    }

    #[test]
    fn unparseable_progress_counts_as_zero() {
        let record = TaskRecord::default();
        assert!(matches(&settings(true), &record, &view(Some(2), None)));
    }

    #[test]
    fn missing_end_date_never_fires() {
        let record = TaskRecord::default();
        assert!(!matches(&settings(true), &record, &view(None, Some(0.0))));
    }

    #[test]
    fn milestones_respect_scope() {
        let record = TaskRecord {
            is_milestone: true,
            ..Default::default()
        };
        let v = view(Some(1), Some(0.0));
        assert!(!matches(&settings(false), &record, &v));
        assert!(matches(&settings(true), &record, &v));
    }
}
