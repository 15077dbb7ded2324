//! Logging service - structured event log in `logs.duckdb`
//!
//! Entries carry event names, entity kinds and ids, CLI commands and error
//! text. Names, emails, quote text and other user-entered content stay out.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use duckdb::types::ToSql;
use duckdb::Connection;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::log_migrations::LOG_MIGRATIONS;
use crate::services::MigrationService;

pub const LOG_DB_FILENAME: &str = "logs.duckdb";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Millisecond timestamp in the high bits, a wrapping sequence in the low 16
fn next_id() -> u64 {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    ((now_ms() as u64) << 16) | seq
}

/// Current unix timestamp in milliseconds
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Which front end wrote an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    Web,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Web => "web",
        }
    }
}

/// An event about to be written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Default::default()
        }
    }

    /// The record, job, quote or user the event is about
    pub fn with_entity(mut self, entity_type: impl Into<String>, id: impl ToString) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Free-form context; on non-error events it is the only payload
    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }
}

/// A stored entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub command: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

impl LogEntry {
    fn from_row(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            timestamp: row.get("timestamp")?,
            entry_point: row.get("entry_point")?,
            app_version: row.get("app_version")?,
            platform: row.get("platform")?,
            event: row.get("event")?,
            entity_type: row.get("entity_type")?,
            entity_id: row.get("entity_id")?,
            command: row.get("command")?,
            error_message: row.get("error_message")?,
            error_details: row.get("error_details")?,
        })
    }
}

/// Selection for `LoggingService::entries`, newest entries first
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub event: Option<String>,
    pub errors_only: bool,
    /// Only entries at or after this unix millisecond
    pub since_ms: Option<i64>,
    pub limit: usize,
}

impl LogFilter {
    pub fn recent(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn errors(limit: usize) -> Self {
        Self {
            errors_only: true,
            limit,
            ..Default::default()
        }
    }

    fn where_clause(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(event) = &self.event {
            conditions.push("event = ?");
            params.push(Box::new(event.clone()));
        }
        if self.errors_only {
            conditions.push("error_message IS NOT NULL");
        }
        if let Some(since) = self.since_ms {
            conditions.push("timestamp >= ?");
            params.push(Box::new(since));
        }
        if conditions.is_empty() {
            (String::new(), params)
        } else {
            (format!("WHERE {}", conditions.join(" AND ")), params)
        }
    }
}

pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
}

impl LoggingService {
    /// Open or create the log database in `data_dir`
    pub fn new(
        data_dir: &Path,
        entry_point: EntryPoint,
        app_version: impl Into<String>,
    ) -> Result<Self> {
        let db_path = data_dir.join(LOG_DB_FILENAME);
        let conn = Connection::open(&db_path)?;
        Self::open(conn, db_path, entry_point, app_version.into())
    }

    pub fn in_memory(entry_point: EntryPoint, app_version: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::open(conn, PathBuf::from(":memory:"), entry_point, app_version.into())
    }

    fn open(
        conn: Connection,
        db_path: PathBuf,
        entry_point: EntryPoint,
        app_version: String,
    ) -> Result<Self> {
        MigrationService::for_set(&conn, LOG_MIGRATIONS).run_pending()?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            entry_point,
            app_version,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Write an event stamped with entry point, version and OS
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let LogEvent {
            event,
            entity_type,
            entity_id,
            command,
            error_message,
            error_details,
        } = event;

        self.conn()?.execute(
            "INSERT INTO sys_logs (
                id, timestamp, entry_point, app_version, platform,
                event, entity_type, entity_id, command, error_message, error_details
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            duckdb::params![
                next_id(),
                now_ms(),
                self.entry_point.as_str(),
                &self.app_version,
                std::env::consts::OS,
                event,
                entity_type,
                entity_id,
                command,
                error_message,
                error_details,
            ],
        )?;
        Ok(())
    }

    /// Like `log`, for callers whose own outcome must not depend on the log
    pub fn emit(&self, event: LogEvent) {
        if let Err(e) = self.log(event) {
            eprintln!("[renohub] Failed to write log event: {}", e);
        }
    }

    pub fn entries(&self, filter: &LogFilter) -> Result<Vec<LogEntry>> {
        let (where_clause, mut params) = filter.where_clause();
        params.push(Box::new(filter.limit as i64));
        let sql = format!(
            "SELECT * FROM sys_logs {} ORDER BY timestamp DESC, id DESC LIMIT ?",
            where_clause
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let entries = stmt
            .query_map(param_refs.as_slice(), LogEntry::from_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn get_by_event(&self, event: &str, limit: usize) -> Result<Vec<LogEntry>> {
        self.entries(&LogFilter {
            event: Some(event.to_string()),
            limit,
            ..Default::default()
        })
    }

    pub fn count(&self) -> Result<u64> {
        let count: u64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_errors(&self) -> Result<u64> {
        let count: u64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM sys_logs WHERE error_message IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Drop entries older than `cutoff_ms`; returns how many went
    pub fn delete_before(&self, cutoff_ms: i64) -> Result<u64> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM sys_logs WHERE timestamp < ?", [cutoff_ms])?;
        Ok(deleted as u64)
    }

    /// Checkpoint, then copy the database file to `output_path`
    pub fn export(&self, output_path: &Path) -> Result<PathBuf> {
        let conn = self.conn()?;
        conn.execute_batch("CHECKPOINT")?;
        std::fs::copy(&self.db_path, output_path)?;
        Ok(output_path.to_path_buf())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
