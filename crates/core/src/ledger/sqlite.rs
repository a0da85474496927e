//! SQLite-backed ledger implementation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{CompletedJob, JobLedger, LedgerError};
use crate::registry::FileId;

/// SQLite-backed completed jobs ledger.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open the ledger, creating the database file and table if needed.
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path).map_err(|e| LedgerError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ledger (useful for testing).
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn =
            Connection::open_in_memory().map_err(|e| LedgerError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LedgerError> {
        conn.execute_batch(
            r#"
            -- One row per finished conversion; file ids repeat across runs
            CREATE TABLE IF NOT EXISTS completed_jobs (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL,
                elapsed_ms INTEGER NOT NULL,
                input_file TEXT NOT NULL,
                new_file_path TEXT NOT NULL,
                completed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_completed_jobs_file ON completed_jobs(file_id);
            "#,
        )
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, LedgerError> {
        self.conn
            .lock()
            .map_err(|e| LedgerError::Database(format!("lock poisoned: {}", e)))
    }

    fn row_to_job(row: &Row<'_>) -> rusqlite::Result<CompletedJob> {
        let file_id: i64 = row.get(0)?;
        let elapsed_ms: i64 = row.get(1)?;
        let input_file: String = row.get(2)?;
        let new_file_path: String = row.get(3)?;
        let completed_at_str: String = row.get(4)?;
        let completed_at = DateTime::parse_from_rfc3339(&completed_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let elapsed_ms = elapsed_ms.max(0) as u64;
        Ok(CompletedJob {
            id: FileId::new(file_id.max(0) as u64),
            total_time: elapsed_ms as f64 / 1000.0,
            elapsed_ms,
            input_file: PathBuf::from(input_file),
            new_file_path: PathBuf::from(new_file_path),
            completed_at,
        })
    }

    fn query(&self, sql: &str, file_id: Option<FileId>) -> Result<Vec<CompletedJob>, LedgerError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let rows = match file_id {
            Some(id) => stmt.query_map(params![id.get() as i64], Self::row_to_job),
            None => stmt.query_map([], Self::row_to_job),
        }
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row.map_err(|e| LedgerError::Database(e.to_string()))?);
        }
        Ok(jobs)
    }
}

impl JobLedger for SqliteLedger {
    fn append(&self, job: &CompletedJob) -> Result<(), LedgerError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO completed_jobs (file_id, elapsed_ms, input_file, new_file_path, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                job.id.get() as i64,
                job.elapsed_ms as i64,
                job.input_file.to_string_lossy(),
                job.new_file_path.to_string_lossy(),
                job.completed_at.to_rfc3339(),
            ],
        )
        .map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<CompletedJob>, LedgerError> {
        self.query(
            "SELECT file_id, elapsed_ms, input_file, new_file_path, completed_at
             FROM completed_jobs ORDER BY seq",
            None,
        )
    }

    fn for_file(&self, id: FileId) -> Result<Vec<CompletedJob>, LedgerError> {
        self.query(
            "SELECT file_id, elapsed_ms, input_file, new_file_path, completed_at
             FROM completed_jobs WHERE file_id = ?1 ORDER BY seq",
            Some(id),
        )
    }

    fn max_file_id(&self) -> Result<Option<FileId>, LedgerError> {
        let conn = self.lock()?;
        let max: Option<i64> = conn
            .query_row("SELECT MAX(file_id) FROM completed_jobs", [], |row| row.get(0))
            .map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(max.map(|id| FileId::new(id.max(0) as u64)))
    }

    fn len(&self) -> Result<usize, LedgerError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM completed_jobs", [], |row| row.get(0))
            .map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(count as usize)
    }

    fn clear(&self) -> Result<usize, LedgerError> {
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM completed_jobs", [])
            .map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(removed)
    }
}
