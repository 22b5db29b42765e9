//! Audit trail written once per finished workflow.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use governance_sdk::{ComplianceStatus, RiskLevel, WorkflowType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use crate::database::Database;
use crate::workflow::{Workflow, WorkflowResult};

/// `system_id` recorded on every orchestrator audit event
pub const ORCHESTRATOR_SYSTEM_ID: &str = "orchestrator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    WorkflowCompleted,
    WorkflowFailed,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::WorkflowCompleted => "workflow_completed",
            AuditAction::WorkflowFailed => "workflow_failed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "workflow_completed" => Ok(AuditAction::WorkflowCompleted),
            "workflow_failed" => Ok(AuditAction::WorkflowFailed),
            _ => Err(anyhow!("Unknown audit action: {}", s)),
        }
    }
}

/// Summary of one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub workflow_id: String,
    pub workflow_type: WorkflowType,
    pub execution_time: Option<f64>,
    pub agents_used: Vec<String>,
    pub overall_risk: Option<RiskLevel>,
    pub overall_compliance: Option<ComplianceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub system_id: String,
    pub action: AuditAction,
    pub details: AuditEntry,
    pub timestamp: DateTime<Local>,
}

impl AuditEvent {
    pub fn workflow_completed(result: &WorkflowResult) -> Self {
        Self {
            system_id: ORCHESTRATOR_SYSTEM_ID.to_string(),
            action: AuditAction::WorkflowCompleted,
            details: AuditEntry {
                workflow_id: result.workflow_id.clone(),
                workflow_type: result.workflow_type,
                execution_time: Some(result.execution_metadata.execution_time_seconds),
                agents_used: result.execution_metadata.agents_executed.clone(),
                overall_risk: result.aggregated_assessment.overall_risk_level(),
                overall_compliance: result.aggregated_assessment.overall_compliance(),
                error: None,
            },
            timestamp: Local::now(),
        }
    }

    pub fn workflow_failed(workflow: &Workflow, error: &str) -> Self {
        Self {
            system_id: ORCHESTRATOR_SYSTEM_ID.to_string(),
            action: AuditAction::WorkflowFailed,
            details: AuditEntry {
                workflow_id: workflow.id.clone(),
                workflow_type: workflow.workflow_type,
                execution_time: workflow.elapsed_seconds(),
                agents_used: workflow.results.keys().cloned().collect(),
                overall_risk: None,
                overall_compliance: None,
                error: Some(error.to_string()),
            },
            timestamp: Local::now(),
        }
    }
}

/// Append-only destination for audit events
///
/// Failures are reported to the caller, which logs them; they never fail a
/// workflow.
pub trait AuditSink: Send + Sync {
    fn log_audit_event(&self, event: &AuditEvent) -> Result<()>;

    /// Persist the full result of a completed run
    fn record_workflow(&self, _result: &WorkflowResult) -> Result<()> {
        Ok(())
    }
}

/// Discards everything
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn log_audit_event(&self, _event: &AuditEvent) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    workflows: Mutex<Vec<WorkflowResult>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn workflows(&self) -> Vec<WorkflowResult> {
        self.workflows
            .lock()
            .map(|workflows| workflows.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn log_audit_event(&self, event: &AuditEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow!("Audit event lock poisoned"))?
            .push(event.clone());
        Ok(())
    }

    fn record_workflow(&self, result: &WorkflowResult) -> Result<()> {
        self.workflows
            .lock()
            .map_err(|_| anyhow!("Audit workflow lock poisoned"))?
            .push(result.clone());
        Ok(())
    }
}

/// Audit sink backed by the SQLite database
pub struct SqliteAuditSink {
    db: Mutex<Database>,
}

impl SqliteAuditSink {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open (creating if needed) the database file and initialize its schema
    pub fn open(path: PathBuf) -> Result<Self> {
        let db = Database::new(path)?;
        db.initialize_schema()?;
        Ok(Self::new(db))
    }

    /// Run a read query against the underlying database
    pub fn with_database<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let db = self
            .db
            .lock()
            .map_err(|_| anyhow!("Audit database lock poisoned"))?;
        f(&db)
    }
}

impl AuditSink for SqliteAuditSink {
    fn log_audit_event(&self, event: &AuditEvent) -> Result<()> {
        self.with_database(|db| db.insert_audit_event(event).map(|_| ()))
    }

    fn record_workflow(&self, result: &WorkflowResult) -> Result<()> {
        self.with_database(|db| db.insert_workflow_run(result))
    }
}
