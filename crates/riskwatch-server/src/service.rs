use crate::snapshot::{SnapshotError, TaskSnapshotProvider};
use chrono::{FixedOffset, Utc};
use riskwatch_alert::{evaluate, AlertFilters, EvalContext, RuleAuditLog, RuleError, RuleStore};
use riskwatch_common::types::{AlertItem, RuleKind, TaskRecord};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// On-demand evaluation request from the interactive view.
#[derive(Debug, Clone, Default)]
pub struct AlertQuery {
    pub filters: AlertFilters,
    /// What-if override for the deadline_progress window, not persisted
    pub threshold_days: Option<i64>,
    /// What-if override for the deadline_progress progress bar, not persisted
    pub progress_threshold: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsView {
    pub items: Vec<AlertItem>,
    /// True when the snapshot could not be fetched and `items` is empty
    pub degraded: bool,
}

/// Glue between the rule engine and the task snapshot source, shared by
/// the HTTP handlers and the notification scheduler.
pub struct RiskService {
    rules: Arc<RuleStore>,
    provider: Box<dyn TaskSnapshotProvider>,
    snapshot_timeout: Duration,
    utc_offset: FixedOffset,
    terminal_statuses: Vec<String>,
    default_project: Option<String>,
}

impl RiskService {
    pub fn new(
        rules: Arc<RuleStore>,
        provider: Box<dyn TaskSnapshotProvider>,
        snapshot_timeout: Duration,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            rules,
            provider,
            snapshot_timeout,
            utc_offset,
            terminal_statuses: Vec::new(),
            default_project: None,
        }
    }

    /// Replaces the built-in terminal status list. Empty keeps the defaults.
    pub fn with_terminal_statuses(mut self, statuses: Vec<String>) -> Self {
        self.terminal_statuses = statuses;
        self
    }

    /// Project scanned by scheduled passes.
    pub fn with_default_project(mut self, project: Option<String>) -> Self {
        self.default_project = project.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn rules(&self) -> &Arc<RuleStore> {
        &self.rules
    }

    pub fn audit(&self) -> &Arc<RuleAuditLog> {
        self.rules.audit_log()
    }

    pub fn default_project(&self) -> Option<&str> {
        self.default_project.as_deref()
    }

    /// Evaluation context for "now".
    pub fn eval_context(&self) -> EvalContext {
        let ctx = EvalContext::new(Utc::now(), self.utc_offset);
        if self.terminal_statuses.is_empty() {
            ctx
        } else {
            ctx.with_terminal_statuses(self.terminal_statuses.clone())
        }
    }

    pub async fn fetch_snapshot(&self, project: Option<&str>) -> Result<Vec<TaskRecord>, SnapshotError> {
        match tokio::time::timeout(self.snapshot_timeout, self.provider.fetch(project)).await {
            Ok(result) => result,
            Err(_) => Err(SnapshotError::Timeout {
                secs: self.snapshot_timeout.as_secs(),
            }),
        }
    }

    /// Evaluates the current snapshot for the interactive view.
    ///
    /// Threshold overrides are validated like a rule update and applied to a
    /// copy of the deadline_progress rules only. A failed snapshot yields an
    /// empty, `degraded` result.
    pub async fn evaluate_on_demand(&self, query: &AlertQuery) -> Result<AlertsView, RuleError> {
        let mut rules = self.rules.get_all();
        if query.threshold_days.is_some() || query.progress_threshold.is_some() {
            let patch = riskwatch_alert::RulePatch {
                threshold_days: query.threshold_days,
                progress_threshold: query.progress_threshold,
                ..Default::default()
            };
            patch.validate_ranges()?;
            for rule in &mut rules {
                if let RuleKind::DeadlineProgress(settings) = &mut rule.kind {
                    if let Some(days) = query.threshold_days.and_then(|d| u32::try_from(d).ok()) {
                        settings.threshold_days = days;
                    }
                    if let Some(p) = query.progress_threshold.and_then(|p| u8::try_from(p).ok()) {
                        settings.progress_threshold = p;
                    }
                }
            }
        }

        let project = query
            .filters
            .project
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        let records = match self.fetch_snapshot(project).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "Task snapshot unavailable, returning no alerts");
                return Ok(AlertsView {
                    items: Vec::new(),
                    degraded: true,
                });
            }
        };

        let items = evaluate(&rules, &records, &self.eval_context(), &query.filters);
        Ok(AlertsView {
            items,
            degraded: false,
        })
    }
}
