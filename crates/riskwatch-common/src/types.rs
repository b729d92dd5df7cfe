use crate::parse::{lenient_bool, lenient_string};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Risk severity assigned to an alert item, ordered from lowest to highest.
///
/// The "unset" rank is modelled as `Option<RiskLevel>::None`, which sorts
/// below every level.
///
/// # Examples
///
/// ```
/// use riskwatch_common::types::RiskLevel;
///
/// let level: RiskLevel = "medium".parse().unwrap();
/// assert_eq!(level, RiskLevel::Medium);
/// assert_eq!(RiskLevel::from_hint("高"), Some(RiskLevel::High));
/// assert!(RiskLevel::High > RiskLevel::Low);
/// assert!(Some(RiskLevel::Low) > None);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Numeric rank: high(3) > medium(2) > low(1). Unset is 0.
    pub fn rank(self) -> u8 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
        }
    }

    /// Parses a pre-existing risk tag from a synchronized record.
    ///
    /// Accepts the Chinese labels used by the source table as well as the
    /// English names. Anything else is treated as unset.
    pub fn from_hint(raw: &str) -> Option<Self> {
        match raw.trim() {
            "低" | "低风险" => Some(RiskLevel::Low),
            "中" | "中风险" => Some(RiskLevel::Medium),
            "高" | "高风险" => Some(RiskLevel::High),
            other => other.parse().ok(),
        }
    }

    /// Chinese display label used in notification messages.
    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "低",
            RiskLevel::Medium => "中",
            RiskLevel::High => "高",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            _ => Err(format!("unknown risk level: {s}")),
        }
    }
}

/// Discriminant of [`RuleKind`]. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    DeadlineProgress,
    Blocked,
    Overdue,
}

impl RuleType {
    pub const ALL: [RuleType; 3] = [RuleType::DeadlineProgress, RuleType::Blocked, RuleType::Overdue];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleType::DeadlineProgress => "deadline_progress",
            RuleType::Blocked => "blocked",
            RuleType::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deadline_progress" => Ok(RuleType::DeadlineProgress),
            "blocked" => Ok(RuleType::Blocked),
            "overdue" => Ok(RuleType::Overdue),
            _ => Err(format!("unknown rule type: {s}")),
        }
    }
}

/// Settings of a `deadline_progress` rule: flags records that are close to
/// their end date while still behind on progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadlineProgress {
    /// Days-until-due cutoff (inclusive).
    pub threshold_days: u32,
    /// Progress percentage cutoff (exclusive), 0..=100.
    pub progress_threshold: u8,
    /// Whether milestone records participate.
    pub include_milestones: bool,
}

/// Settings of a `blocked` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blocked {
    /// Exact value of the record's blocked field that marks it as blocked.
    /// `None` means "not configured" and never matches.
    #[serde(default)]
    pub blocked_value: Option<String>,
}

/// Rule behaviour, one variant per rule type. Each variant carries only the
/// settings it evaluates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    DeadlineProgress(DeadlineProgress),
    Blocked(Blocked),
    Overdue,
}

impl RuleKind {
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleKind::DeadlineProgress(_) => RuleType::DeadlineProgress,
            RuleKind::Blocked(_) => RuleType::Blocked,
            RuleKind::Overdue => RuleType::Overdue,
        }
    }
}

/// A named, independently toggleable risk policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Stable identifier, unique across the store.
    pub key: String,
    /// Human-readable rule name (e.g., "临期进度滞后")
    pub name: String,
    pub enabled: bool,
    /// Whether qualifying alerts should trigger a notification.
    pub auto_notify: bool,
    #[serde(flatten)]
    pub kind: RuleKind,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    pub fn rule_type(&self) -> RuleType {
        self.kind.rule_type()
    }
}

/// One task or milestone record as supplied by the snapshot provider.
///
/// Every field except `record_id` may be missing; date and progress fields
/// are kept raw and parsed by the evaluator so that a malformed value only
/// disables the rule types that depend on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskRecord {
    pub record_id: String,
    pub task_id: Option<String>,
    pub name: Option<String>,
    pub assignee: Option<String>,
    pub project: Option<String>,
    pub status: Option<String>,
    /// ISO date, RFC 3339 timestamp or epoch milliseconds
    pub start_date: Option<Value>,
    /// ISO date, RFC 3339 timestamp or epoch milliseconds
    pub end_date: Option<Value>,
    /// Number, numeric string or percentage string (e.g. "50%")
    pub progress: Option<Value>,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_milestone: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub blocked: Option<String>,
    pub blocked_reason: Option<String>,
    /// Pre-existing risk tag ("低" / "中" / "高")
    pub risk_level_hint: Option<String>,
}

/// An at-risk record produced by one evaluation pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlertItem {
    pub record_id: String,
    pub task_name: Option<String>,
    pub assignee: Option<String>,
    pub project: Option<String>,
    pub status: Option<String>,
    pub end_date: Option<NaiveDate>,
    /// Signed days until the end date; `None` without a parseable end date
    pub days_left: Option<i64>,
    /// Parsed progress percentage; `None` when absent or unparseable
    pub progress: Option<f64>,
    pub risk_level: RiskLevel,
    pub blocked: Option<String>,
    pub blocked_reason: Option<String>,
    /// Keys of the enabled rules that fired on this record, sorted
    pub matched_rule_keys: Vec<String>,
}

impl AlertItem {
    pub fn matched(&self, rule_key: &str) -> bool {
        self.matched_rule_keys.iter().any(|k| k == rule_key)
    }
}

/// Category of a rule configuration change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Enabled,
    Disabled,
    ThresholdUpdated,
    BlockedValueUpdated,
    AutoNotifyToggled,
    MilestoneScopeUpdated,
}

impl RuleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleAction::Enabled => "enabled",
            RuleAction::Disabled => "disabled",
            RuleAction::ThresholdUpdated => "threshold_updated",
            RuleAction::BlockedValueUpdated => "blocked_value_updated",
            RuleAction::AutoNotifyToggled => "auto_notify_toggled",
            RuleAction::MilestoneScopeUpdated => "milestone_scope_updated",
        }
    }
}

impl std::fmt::Display for RuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enabled" => Ok(RuleAction::Enabled),
            "disabled" => Ok(RuleAction::Disabled),
            "threshold_updated" => Ok(RuleAction::ThresholdUpdated),
            "blocked_value_updated" => Ok(RuleAction::BlockedValueUpdated),
            "auto_notify_toggled" => Ok(RuleAction::AutoNotifyToggled),
            "milestone_scope_updated" => Ok(RuleAction::MilestoneScopeUpdated),
            _ => Err(format!("unknown rule action: {s}")),
        }
    }
}

/// Append-only audit record of one changed rule field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleChangeLogEntry {
    pub id: String,
    pub rule_key: String,
    pub action: RuleAction,
    /// Human-readable before → after description, e.g. "thresholdDays: 7 → 5"
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Display for RuleChangeLogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.rule_key,
            self.action,
            self.note
        )
    }
}
