use crate::config::SnapshotConfig;
use async_trait::async_trait;
use riskwatch_common::types::TaskRecord;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot: fetch timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Snapshot: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Snapshot: upstream returned status {0}")]
    Status(u16),

    #[error("Snapshot: I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot: invalid payload: {0}")]
    Decode(String),

    #[error("Snapshot: no source configured (set snapshot.url or snapshot.file)")]
    NotConfigured,
}

/// Source of the current task/milestone table.
#[async_trait]
pub trait TaskSnapshotProvider: Send + Sync {
    /// Returns the current records, optionally scoped to one project.
    async fn fetch(&self, project: Option<&str>) -> Result<Vec<TaskRecord>, SnapshotError>;
}

/// Accepts a bare JSON array, `{"records": [...]}` or `{"data": {"items": [...]}}`.
pub fn decode_records(body: &[u8]) -> Result<Vec<TaskRecord>, SnapshotError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| SnapshotError::Decode(e.to_string()))?;
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => {
            if let Some(records) = map.remove("records") {
                records
            } else if let Some(items) = map
                .remove("data")
                .and_then(|mut data| data.get_mut("items").map(Value::take))
            {
                items
            } else {
                return Err(SnapshotError::Decode(
                    "expected an array, `records` or `data.items`".to_string(),
                ));
            }
        }
        other => {
            return Err(SnapshotError::Decode(format!(
                "expected an array, got {}",
                json_kind(&other)
            )))
        }
    };

    let Value::Array(items) = list else {
        return Err(SnapshotError::Decode("record list is not an array".to_string()));
    };

    let mut records = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<TaskRecord>(item) {
            Ok(record) if !record.record_id.trim().is_empty() => records.push(record),
            Ok(_) => tracing::warn!(index = idx, "Skipping snapshot record without recordId"),
            Err(e) => tracing::warn!(index = idx, error = %e, "Skipping undecodable snapshot record"),
        }
    }
    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn scope(records: Vec<TaskRecord>, project: Option<&str>) -> Vec<TaskRecord> {
    match project.map(str::trim).filter(|p| !p.is_empty()) {
        Some(project) => records
            .into_iter()
            .filter(|r| r.project.as_deref() == Some(project))
            .collect(),
        None => records,
    }
}

/// Fetches the snapshot from an HTTP endpoint with `GET ?project=`.
pub struct HttpSnapshotProvider {
    client: reqwest::Client,
    url: String,
    bearer_token: Option<String>,
}

impl HttpSnapshotProvider {
    pub fn new(url: &str, bearer_token: Option<String>, timeout: Duration) -> Result<Self, SnapshotError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            bearer_token,
        })
    }
}

#[async_trait]
impl TaskSnapshotProvider for HttpSnapshotProvider {
    async fn fetch(&self, project: Option<&str>) -> Result<Vec<TaskRecord>, SnapshotError> {
        let mut req = self.client.get(&self.url);
        if let Some(project) = project {
            req = req.query(&[("project", project)]);
        }
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SnapshotError::Status(status.as_u16()));
        }
        let body = resp.bytes().await?;
        // The upstream may ignore the query parameter
        Ok(scope(decode_records(&body)?, project))
    }
}

/// Reads the snapshot from a JSON file on every fetch.
pub struct FileSnapshotProvider {
    path: PathBuf,
}

impl FileSnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TaskSnapshotProvider for FileSnapshotProvider {
    async fn fetch(&self, project: Option<&str>) -> Result<Vec<TaskRecord>, SnapshotError> {
        let body = tokio::fs::read(&self.path).await?;
        Ok(scope(decode_records(&body)?, project))
    }
}

/// Provider used when no source is configured. Every fetch fails, so
/// evaluation degrades to an empty result instead of refusing to start.
pub struct UnconfiguredSnapshotProvider;

#[async_trait]
impl TaskSnapshotProvider for UnconfiguredSnapshotProvider {
    async fn fetch(&self, _project: Option<&str>) -> Result<Vec<TaskRecord>, SnapshotError> {
        Err(SnapshotError::NotConfigured)
    }
}

pub fn from_config(config: &SnapshotConfig) -> Result<Box<dyn TaskSnapshotProvider>, SnapshotError> {
    if let Some(url) = config.url.as_deref().filter(|u| !u.trim().is_empty()) {
        tracing::info!(url = %url, "Using HTTP task snapshot");
        let provider = HttpSnapshotProvider::new(
            url,
            config.bearer_token.clone(),
            Duration::from_secs(config.timeout_secs.max(1)),
        )?;
        return Ok(Box::new(provider));
    }
    if let Some(file) = config.file.as_deref().filter(|f| !f.trim().is_empty()) {
        tracing::info!(file = %file, "Using file task snapshot");
        return Ok(Box::new(FileSnapshotProvider::new(file)));
    }
    tracing::warn!("No task snapshot source configured; evaluations will return no alerts");
    Ok(Box::new(UnconfiguredSnapshotProvider))
}
