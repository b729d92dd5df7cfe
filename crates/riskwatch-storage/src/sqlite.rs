use crate::error::{Result, StorageError};
use crate::{AuditPersistence, AuditQuery, RulePersistence};
use chrono::DateTime;
use riskwatch_common::types::{Rule, RuleAction, RuleChangeLogEntry};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const DB_FILE: &str = "riskwatch.db";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS risk_rules (
    key TEXT PRIMARY KEY,
    rule_type TEXT NOT NULL,
    payload TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS risk_rule_logs (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    rule_key TEXT NOT NULL,
    action TEXT NOT NULL,
    note TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rule_logs_key ON risk_rule_logs(rule_key, seq);
CREATE TRIGGER IF NOT EXISTS risk_rule_logs_no_update
    BEFORE UPDATE ON risk_rule_logs
    BEGIN SELECT RAISE(ABORT, 'risk_rule_logs is append-only'); END;
CREATE TRIGGER IF NOT EXISTS risk_rule_logs_no_delete
    BEFORE DELETE ON risk_rule_logs
    BEGIN SELECT RAISE(ABORT, 'risk_rule_logs is append-only'); END;
";

/// SQLite-backed rule and change log store.
pub struct SqliteRuleStore {
    conn: Mutex<Connection>,
}

impl SqliteRuleStore {
    /// Opens (or creates) `riskwatch.db` inside `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(DB_FILE);
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        tracing::info!(path = %path.display(), "Opened rule database");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    pub(crate) fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RulePersistence for SqliteRuleStore {
    fn load(&self) -> Result<Vec<Rule>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached("SELECT payload FROM risk_rules ORDER BY key ASC")?;
        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut rules = Vec::with_capacity(payloads.len());
        for payload in payloads {
            rules.push(serde_json::from_str::<Rule>(&payload)?);
        }
        Ok(rules)
    }

    fn save(&self, rule: &Rule) -> Result<()> {
        let payload = serde_json::to_string(rule)?;
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO risk_rules (key, rule_type, payload, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                rule_type = excluded.rule_type,
                payload = excluded.payload,
                updated_at = excluded.updated_at",
            params![
                &rule.key,
                rule.rule_type().as_str(),
                payload,
                rule.updated_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }
}

impl AuditPersistence for SqliteRuleStore {
    fn append(&self, entry: &RuleChangeLogEntry) -> Result<()> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO risk_rule_logs (id, rule_key, action, note, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &entry.id,
                &entry.rule_key,
                entry.action.as_str(),
                &entry.note,
                entry.created_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn list(&self, query: &AuditQuery) -> Result<Vec<RuleChangeLogEntry>> {
        // SQLite treats a negative LIMIT as "no limit"
        let limit = query.limit.map_or(-1, |l| l as i64);
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT id, rule_key, action, note, created_at FROM risk_rule_logs
             WHERE (?1 IS NULL OR rule_key = ?1) AND (?2 IS NULL OR action = ?2)
             ORDER BY seq DESC
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(
                params![
                    query.rule_key.as_deref(),
                    query.action.map(RuleAction::as_str),
                    limit
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (id, rule_key, action, note, created_at) in rows.into_iter().rev() {
            let action = action
                .parse::<RuleAction>()
                .map_err(|detail| StorageError::Corrupt {
                    table: "risk_rule_logs",
                    detail,
                })?;
            let created_at =
                DateTime::from_timestamp_millis(created_at).ok_or_else(|| StorageError::Corrupt {
                    table: "risk_rule_logs",
                    detail: format!("created_at out of range: {created_at}"),
                })?;
            entries.push(RuleChangeLogEntry {
                id,
                rule_key,
                action,
                note,
                created_at,
            });
        }
        Ok(entries)
    }
}
