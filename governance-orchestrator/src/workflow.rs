//! Workflow records and the results handed back to callers.

use chrono::{DateTime, Local};
use governance_sdk::{AgentResult, WorkflowStatus, WorkflowType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::aggregate::AggregatedAssessment;
use crate::error::{OrchestratorError, Result};
use crate::retry::TaskOutcome;
use crate::task::AgentTask;

/// `workflow_<unix-seconds>_<8 hex chars>`
pub fn generate_workflow_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("workflow_{}_{}", Local::now().timestamp(), &suffix[..8])
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowProgress {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub workflow_type: WorkflowType,
    pub tasks: Vec<AgentTask>,
    pub status: WorkflowStatus,
    pub system_context: Map<String, Value>,
    pub results: BTreeMap<String, AgentResult>,
    pub progress: WorkflowProgress,
    pub created_at: DateTime<Local>,
    pub started_at: Option<DateTime<Local>>,
    pub completed_at: Option<DateTime<Local>>,
    pub error: Option<String>,
}

impl Workflow {
    pub fn new(workflow_type: WorkflowType, tasks: Vec<AgentTask>, system_context: Map<String, Value>) -> Self {
        Self {
            id: generate_workflow_id(),
            workflow_type,
            progress: WorkflowProgress {
                total_tasks: tasks.len(),
                ..Default::default()
            },
            tasks,
            status: WorkflowStatus::Created,
            system_context,
            results: BTreeMap::new(),
            created_at: Local::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Move to `next`, stamping start/end times
    pub fn transition(&mut self, next: WorkflowStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(OrchestratorError::InvalidTransition {
                workflow_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }

        match next {
            WorkflowStatus::Running => self.started_at = Some(Local::now()),
            _ if next.is_terminal() => self.completed_at = Some(Local::now()),
            _ => {}
        }
        self.status = next;
        Ok(())
    }

    /// Store a task outcome and its updated retry budget
    pub fn record_outcome(&mut self, outcome: &TaskOutcome) {
        if let Some(task) = self
            .tasks
            .iter_mut()
            .find(|t| t.agent_name == outcome.task.agent_name)
        {
            task.retry_budget = outcome.task.retry_budget;
        }

        if outcome.result.is_completed() {
            self.progress.completed_tasks += 1;
        } else {
            self.progress.failed_tasks += 1;
        }
        self.results
            .insert(outcome.task.agent_name.clone(), outcome.result.clone());
    }

    /// Seconds between start and completion (or now, while running)
    pub fn elapsed_seconds(&self) -> Option<f64> {
        let started = self.started_at?;
        let end = self.completed_at.unwrap_or_else(Local::now);
        Some((end - started).num_milliseconds() as f64 / 1000.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub execution_time_seconds: f64,
    pub agents_executed: Vec<String>,
    pub total_agents: usize,
}

/// Outcome of a completed workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_id: String,
    pub workflow_type: WorkflowType,
    pub status: WorkflowStatus,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub agent_results: BTreeMap<String, AgentResult>,
    pub aggregated_assessment: AggregatedAssessment,
    pub execution_metadata: ExecutionMetadata,
}

/// A workflow that left the active set, with its result when it completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub workflow: Workflow,
    pub result: Option<WorkflowResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowStatusReport {
    Active {
        id: String,
        status: WorkflowStatus,
        progress: WorkflowProgress,
        created_at: DateTime<Local>,
    },
    Finished {
        id: String,
        status: WorkflowStatus,
        completed_at: Option<DateTime<Local>>,
        execution_time: Option<f64>,
    },
}

impl WorkflowStatusReport {
    pub fn status(&self) -> WorkflowStatus {
        match self {
            WorkflowStatusReport::Active { status, .. } | WorkflowStatusReport::Finished { status, .. } => *status,
        }
    }
}

impl From<&HistoryEntry> for WorkflowStatusReport {
    fn from(entry: &HistoryEntry) -> Self {
        let execution_time = match &entry.result {
            Some(result) => Some(result.execution_metadata.execution_time_seconds),
            None => entry.workflow.elapsed_seconds(),
        };
        WorkflowStatusReport::Finished {
            id: entry.workflow.id.clone(),
            status: entry.workflow.status,
            completed_at: entry.workflow.completed_at,
            execution_time,
        }
    }
}
