use crate::app::ports::ProcessedLedger;
use crate::common::error::{Result, ScraperError};
use crate::common::types::FlowContext;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

/// Process-local ledger, used by tests and the offline `extract` command
#[derive(Default)]
pub struct InMemoryLedger {
    marks: Mutex<HashSet<(String, String)>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.marks.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut marks) = self.marks.lock() {
            marks.clear();
        }
    }
}

fn poisoned() -> ScraperError {
    ScraperError::Api {
        message: "ledger lock poisoned".into(),
    }
}

#[async_trait]
impl ProcessedLedger for InMemoryLedger {
    async fn is_processed(&self, identity: &str, flow: &FlowContext) -> Result<bool> {
        let marks = self.marks.lock().map_err(|_| poisoned())?;
        Ok(marks.contains(&(identity.to_string(), flow.flow_id.clone())))
    }

    async fn mark_processed(&self, identity: &str, flow: &FlowContext, _job_id: Option<&str>) -> Result<()> {
        let mut marks = self.marks.lock().map_err(|_| poisoned())?;
        marks.insert((identity.to_string(), flow.flow_id.clone()));
        Ok(())
    }
}

/// SQLite-backed ledger. The mutex serializes writers; one logical crawler per flow
/// is assumed, so there is no compare-and-swap.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS processed_marks (
                identity    TEXT NOT NULL,
                flow_id     TEXT NOT NULL,
                job_id      TEXT,
                marked_at   INTEGER NOT NULL,
                PRIMARY KEY (identity, flow_id)
            );
            "#,
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Number of marks recorded for a flow
    pub fn count_for_flow(&self, flow_id: &str) -> Result<u64> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM processed_marks WHERE flow_id = ?1",
            params![flow_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[async_trait]
impl ProcessedLedger for SqliteLedger {
    async fn is_processed(&self, identity: &str, flow: &FlowContext) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let mut stmt =
            conn.prepare("SELECT 1 FROM processed_marks WHERE identity = ?1 AND flow_id = ?2")?;
        let mut rows = stmt.query(params![identity, flow.flow_id])?;
        let found = rows.next()?.is_some();
        Ok(found)
    }

    async fn mark_processed(&self, identity: &str, flow: &FlowContext, job_id: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        conn.execute(
            "INSERT INTO processed_marks (identity, flow_id, job_id, marked_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(identity, flow_id) DO UPDATE SET job_id=excluded.job_id, marked_at=excluded.marked_at",
            params![identity, flow.flow_id, job_id, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }
}
