use crate::config::ServerConfig;
use crate::rule_seed;
use crate::scheduler::NotifyScheduler;
use crate::service::RiskService;
use crate::snapshot;
use anyhow::Result;
use chrono::{DateTime, Utc};
use riskwatch_alert::{RuleAuditLog, RuleStore};
use riskwatch_notify::channels::{LogChannel, WebhookChannel};
use riskwatch_notify::{NotificationChannel, NotificationManager, SilenceWindow};
use riskwatch_storage::SqliteRuleStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RiskService>,
    pub scheduler: Arc<NotifyScheduler>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}

/// Opens the rule database under `data_dir` and seeds missing rules.
pub fn open_rule_store(config: &ServerConfig) -> Result<Arc<RuleStore>> {
    let db = Arc::new(SqliteRuleStore::open(Path::new(&config.data_dir))?);
    let audit = Arc::new(RuleAuditLog::new(db.clone()));
    let store = RuleStore::open(db, audit, rule_seed::default_rules(&config.rules))?;
    Ok(Arc::new(store))
}

pub fn build_service(config: &ServerConfig, rules: Arc<RuleStore>) -> Result<RiskService> {
    let provider = snapshot::from_config(&config.snapshot)?;
    Ok(RiskService::new(
        rules,
        provider,
        Duration::from_secs(config.snapshot.timeout_secs.max(1)),
        config.utc_offset(),
    )
    .with_terminal_statuses(config.terminal_statuses.clone())
    .with_default_project(config.snapshot.project.clone()))
}

pub fn build_notifier(config: &ServerConfig) -> Result<NotificationManager> {
    let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
    for hook in &config.notify.webhooks {
        channels.push(Box::new(WebhookChannel::new(
            &hook.name,
            &hook.url,
            hook.body_template.clone(),
        )?));
    }
    if config.notify.log_channel {
        channels.push(Box::new(LogChannel));
    }
    if channels.is_empty() {
        tracing::warn!("No notification channels configured; scheduled notifications will fail");
    }

    let silence_windows = config
        .notify
        .silence_windows
        .iter()
        .map(|w| SilenceWindow::parse(&w.start, &w.end))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NotificationManager::new(
        channels,
        silence_windows,
        Duration::from_secs(config.scheduler.dispatch_timeout_secs.max(1)),
        config.utc_offset(),
    ))
}
