use riskwatch_common::types::{AlertItem, RiskLevel};
use serde::Deserialize;

/// Display-layer narrowing applied after rule matching.
///
/// Blank strings are treated as "no filter".
///
/// # Examples
///
/// ```
/// use riskwatch_alert::AlertFilters;
///
/// let filters = AlertFilters {
///     assignee: Some("张".into()),
///     ..Default::default()
/// };
/// assert!(!filters.is_empty());
/// assert!(AlertFilters::default().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AlertFilters {
    /// Exact project name
    pub project: Option<String>,
    /// Exact status
    pub status: Option<String>,
    /// Assignee substring
    pub assignee: Option<String>,
    pub risk_level: Option<RiskLevel>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl AlertFilters {
    pub fn is_empty(&self) -> bool {
        non_blank(&self.project).is_none()
            && non_blank(&self.status).is_none()
            && non_blank(&self.assignee).is_none()
            && self.risk_level.is_none()
    }

    pub fn accepts(&self, item: &AlertItem) -> bool {
        if let Some(project) = non_blank(&self.project) {
            if item.project.as_deref() != Some(project) {
                return false;
            }
        }
        if let Some(status) = non_blank(&self.status) {
            if item.status.as_deref() != Some(status) {
                return false;
            }
        }
        if let Some(assignee) = non_blank(&self.assignee) {
            if !item.assignee.as_deref().is_some_and(|a| a.contains(assignee)) {
                return false;
            }
        }
        if let Some(level) = self.risk_level {
            if item.risk_level != level {
                return false;
            }
        }
        true
    }
}
