//! SQLite database for the persistent audit trail
//!
//! Stores the audit events written after every workflow run together with
//! the full result of each completed run, so assessments can be reviewed
//! after the process exits.
//!
//! # Database Schema
//!
//! 1. **audit_events** - One row per audit event (action, workflow id, JSON details)
//! 2. **workflow_runs** - Full `WorkflowResult` of each completed workflow (added in v2)
//! 3. **schema_version** - Database schema version for migrations
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use governance_orchestrator::database::Database;
//! use governance_orchestrator::audit::AuditAction;
//!
//! # fn main() -> anyhow::Result<()> {
//! let db_path = dirs::home_dir()
//!     .unwrap()
//!     .join(".governance-orchestrator")
//!     .join("audit.db");
//! let db = Database::new(db_path)?;
//! db.initialize_schema()?;
//!
//! let failures = db.list_audit_events(20, 0, Some(AuditAction::WorkflowFailed))?;
//! for record in failures {
//!     println!("{} {}", record.event.timestamp, record.event.details.workflow_id);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! WAL mode is enabled for file databases. Run `delete_audit_events_before()`
//! periodically to bound the database size.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
use governance_sdk::{AgentResult, WorkflowType};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;

use crate::audit::{AuditAction, AuditEntry, AuditEvent};
use crate::workflow::WorkflowResult;

/// Database wrapper for audit persistence
pub struct Database {
    conn: Connection,
}

/// Audit event with its row id
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedAuditEvent {
    pub id: i64,
    pub event: AuditEvent,
}

/// One row of `workflow_runs`, without the full result payload
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRunSummary {
    pub workflow_id: String,
    pub workflow_type: WorkflowType,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub execution_time: f64,
    pub overall_risk: Option<String>,
    pub overall_compliance: Option<String>,
}

/// Aggregate numbers for one workflow type
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowTypeStats {
    pub total: usize,
    pub high_risk: usize,
    pub non_compliant: usize,
    pub avg_execution_time: Option<f64>,
}

impl Database {
    /// Create a new database connection at the specified path
    pub fn new(path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        // Enable WAL mode for better concurrent access
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self { conn })
    }

    /// Create an in-memory database
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Initialize database schema with all tables and indexes
    pub fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS audit_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                system_id TEXT NOT NULL,
                action TEXT NOT NULL,
                workflow_id TEXT NOT NULL,
                workflow_type TEXT NOT NULL,
                details TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_action ON audit_events(action);
            CREATE INDEX IF NOT EXISTS idx_audit_workflow_id ON audit_events(workflow_id);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_events(timestamp DESC);

            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (1)",
            [],
        )?;

        self.migrate_to_v2()?;

        Ok(())
    }

    /// Migrate database schema to version 2 (stored workflow results)
    pub fn migrate_to_v2(&self) -> Result<()> {
        if self.get_schema_version()? < 2 {
            self.conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS workflow_runs (
                    workflow_id TEXT PRIMARY KEY,
                    workflow_type TEXT NOT NULL,
                    status TEXT NOT NULL,
                    start_time TEXT NOT NULL,
                    end_time TEXT NOT NULL,
                    execution_time REAL NOT NULL,
                    overall_risk TEXT,
                    overall_compliance TEXT,
                    result_json TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_runs_type ON workflow_runs(workflow_type);
                CREATE INDEX IF NOT EXISTS idx_runs_start_time ON workflow_runs(start_time DESC);

                UPDATE schema_version SET version = 2;
                "#,
            )?;
        }

        Ok(())
    }

    /// Get current schema version
    pub fn get_schema_version(&self) -> Result<i32> {
        let version: i32 =
            self.conn
                .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
        Ok(version)
    }

    /// Insert an audit event, returning its row id
    pub fn insert_audit_event(&self, event: &AuditEvent) -> Result<i64> {
        let details = serde_json::to_string(&event.details)?;

        self.conn.execute(
            r#"
            INSERT INTO audit_events (system_id, action, workflow_id, workflow_type, details, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                event.system_id,
                event.action.as_str(),
                event.details.workflow_id,
                event.details.workflow_type.as_str(),
                details,
                format_time(&event.timestamp),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// List audit events, newest first, with pagination and optional action filter
    pub fn list_audit_events(
        &self,
        limit: usize,
        offset: usize,
        action: Option<AuditAction>,
    ) -> Result<Vec<PersistedAuditEvent>> {
        let events = match action {
            Some(action) => {
                let mut stmt = self.conn.prepare(
                    r#"
                    SELECT id, system_id, action, details, timestamp
                    FROM audit_events
                    WHERE action = ?1
                    ORDER BY timestamp DESC, id DESC
                    LIMIT ?2 OFFSET ?3
                    "#,
                )?;
                let rows = stmt.query_map(params![action.as_str(), limit, offset], map_audit_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    r#"
                    SELECT id, system_id, action, details, timestamp
                    FROM audit_events
                    ORDER BY timestamp DESC, id DESC
                    LIMIT ?1 OFFSET ?2
                    "#,
                )?;
                let rows = stmt.query_map(params![limit, offset], map_audit_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(events)
    }

    /// All audit events recorded for one workflow, oldest first
    pub fn get_audit_events_for_workflow(&self, workflow_id: &str) -> Result<Vec<PersistedAuditEvent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, system_id, action, details, timestamp
            FROM audit_events
            WHERE workflow_id = ?1
            ORDER BY id ASC
            "#,
        )?;

        let events = stmt
            .query_map(params![workflow_id], map_audit_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    pub fn count_audit_events(&self) -> Result<usize> {
        let count: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM audit_events", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete audit events older than the cutoff
    pub fn delete_audit_events_before(&self, cutoff: DateTime<Local>) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM audit_events WHERE timestamp < ?1",
            params![format_time(&cutoff)],
        )?;
        Ok(deleted)
    }

    /// Insert or replace the stored result of a completed workflow
    pub fn insert_workflow_run(&self, result: &WorkflowResult) -> Result<()> {
        let result_json = serde_json::to_string(result)?;
        let overall_risk = result
            .aggregated_assessment
            .overall_risk_level()
            .map(|level| level.as_str());
        let overall_compliance = result
            .aggregated_assessment
            .overall_compliance()
            .map(|status| status.as_str());

        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO workflow_runs (
                workflow_id, workflow_type, status, start_time, end_time,
                execution_time, overall_risk, overall_compliance, result_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                result.workflow_id,
                result.workflow_type.as_str(),
                result.status.as_str(),
                format_time(&result.start_time),
                format_time(&result.end_time),
                result.execution_metadata.execution_time_seconds,
                overall_risk,
                overall_compliance,
                result_json,
            ],
        )?;

        Ok(())
    }

    /// Fetch the full stored result of a workflow
    pub fn get_workflow_run(&self, workflow_id: &str) -> Result<Option<WorkflowResult>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT result_json FROM workflow_runs WHERE workflow_id = ?1",
                params![workflow_id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|data| {
            serde_json::from_str(&data)
                .with_context(|| format!("Failed to parse stored result of {}", workflow_id))
        })
        .transpose()
    }

    /// List stored runs, newest first, with optional type filter
    pub fn list_workflow_runs(
        &self,
        limit: usize,
        offset: usize,
        workflow_type: Option<WorkflowType>,
    ) -> Result<Vec<WorkflowRunSummary>> {
        let runs = match workflow_type {
            Some(workflow_type) => {
                let mut stmt = self.conn.prepare(
                    r#"
                    SELECT workflow_id, workflow_type, start_time, end_time,
                           execution_time, overall_risk, overall_compliance
                    FROM workflow_runs
                    WHERE workflow_type = ?1
                    ORDER BY start_time DESC
                    LIMIT ?2 OFFSET ?3
                    "#,
                )?;
                let rows = stmt.query_map(
                    params![workflow_type.as_str(), limit, offset],
                    map_run_row,
                )?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    r#"
                    SELECT workflow_id, workflow_type, start_time, end_time,
                           execution_time, overall_risk, overall_compliance
                    FROM workflow_runs
                    ORDER BY start_time DESC
                    LIMIT ?1 OFFSET ?2
                    "#,
                )?;
                let rows = stmt.query_map(params![limit, offset], map_run_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(runs)
    }

    /// Get run statistics for one workflow type
    pub fn get_workflow_type_stats(&self, workflow_type: WorkflowType) -> Result<WorkflowTypeStats> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                COUNT(*) as total,
                COALESCE(SUM(CASE WHEN overall_risk IN ('high', 'critical') THEN 1 ELSE 0 END), 0) as high_risk,
                COALESCE(SUM(CASE WHEN overall_compliance = 'non_compliant' THEN 1 ELSE 0 END), 0) as non_compliant,
                AVG(execution_time) as avg_execution_time
            FROM workflow_runs
            WHERE workflow_type = ?1
            "#,
        )?;

        let stats = stmt.query_row(params![workflow_type.as_str()], |row| {
            Ok(WorkflowTypeStats {
                total: row.get(0)?,
                high_risk: row.get(1)?,
                non_compliant: row.get(2)?,
                avg_execution_time: row.get(3)?,
            })
        })?;

        Ok(stats)
    }

    /// Results of every agent in a stored run
    pub fn get_agent_results(&self, workflow_id: &str) -> Result<Vec<(String, AgentResult)>> {
        Ok(self
            .get_workflow_run(workflow_id)?
            .map(|run| run.agent_results.into_iter().collect())
            .unwrap_or_default())
    }
}

// Helper functions for mapping between database and Rust types

fn text_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

/// Fixed-width UTC text, so string order in SQL matches time order
fn format_time<Tz: TimeZone>(time: &DateTime<Tz>) -> String {
    time.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(column: usize, value: &str) -> rusqlite::Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| text_error(column, e))
}

/// Map a database row to PersistedAuditEvent
fn map_audit_row(row: &Row) -> rusqlite::Result<PersistedAuditEvent> {
    let id: i64 = row.get(0)?;
    let system_id: String = row.get(1)?;
    let action_str: String = row.get(2)?;
    let details_str: String = row.get(3)?;
    let timestamp_str: String = row.get(4)?;

    let action: AuditAction = action_str
        .parse()
        .map_err(|e: anyhow::Error| text_error(2, std::io::Error::other(e.to_string())))?;

    let details: AuditEntry = serde_json::from_str(&details_str).map_err(|e| text_error(3, e))?;

    Ok(PersistedAuditEvent {
        id,
        event: AuditEvent {
            system_id,
            action,
            details,
            timestamp: parse_time(4, &timestamp_str)?,
        },
    })
}

/// Map a database row to WorkflowRunSummary
fn map_run_row(row: &Row) -> rusqlite::Result<WorkflowRunSummary> {
    let workflow_type_str: String = row.get(1)?;
    let start_time_str: String = row.get(2)?;
    let end_time_str: String = row.get(3)?;

    Ok(WorkflowRunSummary {
        workflow_id: row.get(0)?,
        workflow_type: workflow_type_str.parse().map_err(|e| text_error(1, e))?,
        start_time: parse_time(2, &start_time_str)?,
        end_time: parse_time(3, &end_time_str)?,
        execution_time: row.get(4)?,
        overall_risk: row.get(5)?,
        overall_compliance: row.get(6)?,
    })
}
