use crate::service::RiskService;
use chrono::Utc;
use riskwatch_alert::{match_records, NotificationDedupTracker, RuleChange};
use riskwatch_common::types::Rule;
use riskwatch_notify::NotificationManager;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::{interval, Duration, MissedTickBehavior};
use utoipa::ToSchema;

/// Summary of one scheduled notification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PassReport {
    /// 快照中的记录数
    pub evaluated: usize,
    /// 命中至少一条规则的记录数
    pub matched: usize,
    /// 本轮成功发送的通知数
    pub sent: usize,
    /// 发送失败（下轮重试）的通知数
    pub failed: usize,
    /// 因风险解除而清除的去重记录数
    pub cleared: usize,
    /// 静默时段内推迟的通知数
    pub deferred: usize,
    /// 本轮因停机而中断
    pub cancelled: bool,
    /// 快照获取失败，本轮未做任何变更
    pub snapshot_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(PassReport),
    /// Another pass was still running
    Skipped,
}

/// Periodic evaluate-dedup-dispatch loop. At most one pass runs at a time,
/// whether triggered by the timer or manually.
pub struct NotifyScheduler {
    service: Arc<RiskService>,
    dedup: Arc<NotificationDedupTracker>,
    notifier: Arc<NotificationManager>,
    interval_secs: u64,
    run_lock: Mutex<()>,
    shutdown: watch::Receiver<bool>,
}

impl NotifyScheduler {
    pub fn new(
        service: Arc<RiskService>,
        dedup: Arc<NotificationDedupTracker>,
        notifier: Arc<NotificationManager>,
        interval_secs: u64,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            service,
            dedup,
            notifier,
            interval_secs,
            run_lock: Mutex::new(()),
            shutdown,
        }
    }

    pub fn dedup(&self) -> &Arc<NotificationDedupTracker> {
        &self.dedup
    }

    pub async fn run(self: Arc<Self>) {
        tracing::info!(
            interval_secs = self.interval_secs,
            channels = self.notifier.channels().len(),
            "Risk notification scheduler started"
        );

        let mut tick = interval(Duration::from_secs(self.interval_secs.max(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let PassOutcome::Skipped = self.run_once().await {
                        tracing::warn!("Previous notification pass still running, tick skipped");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Risk notification scheduler stopped");
    }

    /// Runs one pass now unless one is already in flight.
    pub async fn run_once(&self) -> PassOutcome {
        let Ok(_guard) = self.run_lock.try_lock() else {
            return PassOutcome::Skipped;
        };
        let report = self.pass().await;
        tracing::info!(
            evaluated = report.evaluated,
            matched = report.matched,
            sent = report.sent,
            failed = report.failed,
            cleared = report.cleared,
            deferred = report.deferred,
            cancelled = report.cancelled,
            snapshot_failed = report.snapshot_failed,
            "Notification pass finished"
        );
        PassOutcome::Completed(report)
    }

    async fn pass(&self) -> PassReport {
        let mut report = PassReport::default();

        let records = match self.service.fetch_snapshot(self.service.default_project()).await {
            Ok(records) => records,
            Err(e) => {
                // Dedup state is left untouched: nothing is known about the conditions
                tracing::warn!(error = %e, "Task snapshot unavailable, skipping notification pass");
                report.snapshot_failed = true;
                return report;
            }
        };
        report.evaluated = records.len();

        let rules = self.service.rules().get_all();
        let items = match_records(&rules, &records, &self.service.eval_context());
        report.matched = items.len();

        for rule in &rules {
            if !rule.enabled || !rule.auto_notify {
                report.cleared += self.dedup.clear_rule(&rule.key);
                continue;
            }
            let active: HashSet<&str> = items
                .iter()
                .filter(|item| item.matched(&rule.key))
                .map(|item| item.record_id.as_str())
                .collect();
            report.cleared += self.dedup.retain_active(&rule.key, &active);
        }

        let notify_rules: Vec<&Rule> = rules.iter().filter(|r| r.enabled && r.auto_notify).collect();

        if self.notifier.is_silenced(Utc::now()) {
            report.deferred = items
                .iter()
                .flat_map(|item| notify_rules.iter().map(move |rule| (item, rule)))
                .filter(|(item, rule)| {
                    item.matched(&rule.key) && !self.dedup.contains(&item.record_id, &rule.key)
                })
                .count();
            if report.deferred > 0 {
                tracing::info!(deferred = report.deferred, "Notifications deferred (silence window active)");
            }
            return report;
        }

        let mut shutdown = self.shutdown.clone();
        'items: for item in &items {
            for rule in &notify_rules {
                if !item.matched(&rule.key) {
                    continue;
                }
                if *shutdown.borrow() {
                    report.cancelled = true;
                    break 'items;
                }
                if !self.dedup.should_notify(&item.record_id, &rule.key) {
                    continue;
                }

                tokio::select! {
                    result = self.notifier.dispatch(item, rule) => match result {
                        Ok(()) => {
                            self.dedup.mark_notified(&item.record_id, &rule.key);
                            report.sent += 1;
                        }
                        Err(e) => {
                            tracing::error!(
                                record_id = %item.record_id,
                                rule_key = %rule.key,
                                error = %e,
                                "Notification failed, will retry next pass"
                            );
                            self.dedup.clear(&item.record_id, &rule.key);
                            report.failed += 1;
                        }
                    },
                    _ = wait_for_shutdown(&mut shutdown) => {
                        self.dedup.clear(&item.record_id, &rule.key);
                        report.cancelled = true;
                        break 'items;
                    }
                }
            }
        }
        report
    }
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone: shutdown can no longer be requested
            std::future::pending::<()>().await;
        }
    }
}

/// Logs every rule configuration change until the store is dropped.
pub async fn log_rule_changes(mut rx: broadcast::Receiver<RuleChange>) {
    loop {
        match rx.recv().await {
            Ok(change) => {
                for entry in &change.entries {
                    tracing::info!(
                        rule_key = %entry.rule_key,
                        action = %entry.action,
                        note = %entry.note,
                        enabled = change.rule.enabled,
                        "Rule configuration changed"
                    );
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Rule change log subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
