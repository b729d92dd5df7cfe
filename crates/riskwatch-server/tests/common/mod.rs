#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{Duration, FixedOffset, Utc};
use riskwatch_alert::NotificationDedupTracker;
use riskwatch_common::types::{AlertItem, Rule, TaskRecord};
use riskwatch_notify::{NotificationChannel, NotificationManager, SilenceWindow};
use riskwatch_server::app;
use riskwatch_server::config::ServerConfig;
use riskwatch_server::scheduler::NotifyScheduler;
use riskwatch_server::service::RiskService;
use riskwatch_server::snapshot::{SnapshotError, TaskSnapshotProvider};
use riskwatch_server::state::{self, AppState};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::watch;
use tower::util::ServiceExt;

/// Snapshot contents controlled by the test.
#[derive(Default)]
pub struct SnapshotState {
    records: Mutex<Vec<TaskRecord>>,
    failing: AtomicBool,
}

impl SnapshotState {
    pub fn set_records(&self, records: Vec<TaskRecord>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

struct SnapshotHandle(Arc<SnapshotState>);

#[async_trait]
impl TaskSnapshotProvider for SnapshotHandle {
    async fn fetch(&self, project: Option<&str>) -> Result<Vec<TaskRecord>, SnapshotError> {
        if self.0.failing.load(Ordering::SeqCst) {
            return Err(SnapshotError::Status(503));
        }
        let records = self.0.records.lock().unwrap().clone();
        Ok(match project {
            Some(p) => records
                .into_iter()
                .filter(|r| r.project.as_deref() == Some(p))
                .collect(),
            None => records,
        })
    }
}

/// Deliveries seen by the recording channel.
#[derive(Default)]
pub struct ChannelState {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

impl ChannelState {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay_ms(&self, ms: u64) {
        self.delay_ms.store(ms, Ordering::SeqCst);
    }
}

struct RecordingChannel(Arc<ChannelState>);

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, alert: &AlertItem, rule: &Rule) -> Result<()> {
        let delay = self.0.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.0.failing.load(Ordering::SeqCst) {
            anyhow::bail!("recording channel is down");
        }
        self.0
            .sent
            .lock()
            .unwrap()
            .push((alert.record_id.clone(), rule.key.clone()));
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
    pub snapshot: Arc<SnapshotState>,
    pub channel: Arc<ChannelState>,
    pub dedup: Arc<NotificationDedupTracker>,
    pub shutdown_tx: watch::Sender<bool>,
}

pub fn build_test_context() -> Result<TestContext> {
    build_test_context_with(Vec::new())
}

/// Silence windows covering the whole day.
pub fn always_silent() -> Vec<SilenceWindow> {
    vec![
        SilenceWindow::parse("00:00", "23:59").unwrap(),
        SilenceWindow::parse("23:59", "00:00").unwrap(),
    ]
}

pub fn build_test_context_with(silence_windows: Vec<SilenceWindow>) -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    let mut config = ServerConfig::parse(
        r#"
        [rules]
        deadline_progress_auto_notify = true
        "#,
    )?;
    config.data_dir = temp_dir.path().to_string_lossy().to_string();

    let snapshot = Arc::new(SnapshotState::default());
    let channel = Arc::new(ChannelState::default());

    let rules = state::open_rule_store(&config)?;
    let service = Arc::new(RiskService::new(
        rules,
        Box::new(SnapshotHandle(snapshot.clone())),
        std::time::Duration::from_secs(2),
        config.utc_offset(),
    ));
    let notifier = Arc::new(NotificationManager::new(
        vec![Box::new(RecordingChannel(channel.clone()))],
        silence_windows,
        std::time::Duration::from_secs(10),
        config.utc_offset(),
    ));
    let dedup = Arc::new(NotificationDedupTracker::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Arc::new(NotifyScheduler::new(
        service.clone(),
        dedup.clone(),
        notifier,
        config.scheduler.interval_secs,
        shutdown_rx,
    ));

    let state = AppState {
        service,
        scheduler,
        start_time: Utc::now(),
        config: Arc::new(config),
    };
    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
        snapshot,
        channel,
        dedup,
        shutdown_tx,
    })
}

/// Date `offset` days from today in UTC+8, as `YYYY-MM-DD`.
pub fn day(offset: i64) -> String {
    let tz = FixedOffset::east_opt(8 * 3600).unwrap();
    (Utc::now().with_timezone(&tz).date_naive() + Duration::days(offset))
        .format("%Y-%m-%d")
        .to_string()
}

/// Builds a record from a JSON object, the way the snapshot source sends it.
pub fn record(fields: Value) -> TaskRecord {
    serde_json::from_value(fields).expect("record should decode")
}

/// Record due in `offset` days with the given progress.
pub fn task(id: &str, offset: i64, progress: i64) -> TaskRecord {
    record(json!({
        "recordId": id,
        "name": format!("任务 {id}"),
        "assignee": "张三",
        "project": "Apollo",
        "status": "进行中",
        "endDate": day(offset),
        "progress": progress,
    }))
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => {
            builder = builder.header("Content-Type", "application/json");
            builder
                .body(Body::from(body.to_string()))
                .expect("request should build")
        }
        None => builder.body(Body::empty()).expect("request should build"),
    };

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}
