use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// 业务时区（相对 UTC 的小时数），用于解析截止日期和静默时段
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    /// 视为已结束的任务状态，为空时使用内置列表
    #[serde(default)]
    pub terminal_statuses: Vec<String>,

    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    /// 首次启动时写入的规则默认值；已存在的规则不受影响
    #[serde(default)]
    pub rules: RuleDefaults,
}

/// 任务快照来源：`url` 与 `file` 二选一，`url` 优先
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_snapshot_timeout_secs")]
    pub timeout_secs: u64,
    /// 定时通知所扫描的项目，为空时扫描全部
    #[serde(default)]
    pub project: Option<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            url: None,
            file: None,
            bearer_token: None,
            timeout_secs: default_snapshot_timeout_secs(),
            project: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,
    #[serde(default = "default_scheduler_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            interval_secs: default_scheduler_interval_secs(),
            dispatch_timeout_secs: default_dispatch_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
    /// 同时把通知写入日志
    #[serde(default = "default_log_channel")]
    pub log_channel: bool,
    #[serde(default)]
    pub silence_windows: Vec<SilenceWindowConfig>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhooks: Vec::new(),
            log_channel: default_log_channel(),
            silence_windows: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub name: String,
    pub url: String,
    /// JSON 模板，支持 `{{task_name}}` `{{days_left}}` `{{message}}` 等占位符
    #[serde(default)]
    pub body_template: Option<String>,
}

/// 静默时段（HH:MM，业务时区）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilenceWindowConfig {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefaults {
    #[serde(default = "default_threshold_days")]
    pub threshold_days: u32,
    #[serde(default = "default_progress_threshold")]
    pub progress_threshold: u8,
    #[serde(default = "default_include_milestones")]
    pub include_milestones: bool,
    #[serde(default = "default_blocked_value")]
    pub blocked_value: Option<String>,
    #[serde(default)]
    pub deadline_progress_auto_notify: bool,
    #[serde(default = "default_auto_notify")]
    pub blocked_auto_notify: bool,
    #[serde(default = "default_auto_notify")]
    pub overdue_auto_notify: bool,
}

impl Default for RuleDefaults {
    fn default() -> Self {
        Self {
            threshold_days: default_threshold_days(),
            progress_threshold: default_progress_threshold(),
            include_milestones: default_include_milestones(),
            blocked_value: default_blocked_value(),
            deadline_progress_auto_notify: false,
            blocked_auto_notify: default_auto_notify(),
            overdue_auto_notify: default_auto_notify(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_utc_offset_hours() -> i32 {
    8
}

fn default_snapshot_timeout_secs() -> u64 {
    15
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_scheduler_interval_secs() -> u64 {
    300
}

fn default_dispatch_timeout_secs() -> u64 {
    10
}

fn default_log_channel() -> bool {
    true
}

fn default_threshold_days() -> u32 {
    7
}

fn default_progress_threshold() -> u8 {
    80
}

fn default_include_milestones() -> bool {
    true
}

fn default_blocked_value() -> Option<String> {
    Some("是".to_string())
}

fn default_auto_notify() -> bool {
    true
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(-12..=14).contains(&self.utc_offset_hours) {
            anyhow::bail!("utc_offset_hours out of range: {}", self.utc_offset_hours);
        }
        if self.scheduler.interval_secs == 0 {
            anyhow::bail!("scheduler.interval_secs must be positive");
        }
        if self.rules.progress_threshold > 100 {
            anyhow::bail!("rules.progress_threshold must be within 0..=100");
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> FixedOffset {
        // validate() keeps the offset within range; UTC is the fallback
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }
}
