//! Error type for orchestrator operations.

use governance_sdk::WorkflowStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("workflow not found: {0}")]
    NotFound(String),

    #[error("workflow {workflow_id} cannot move from {from} to {to}")]
    InvalidTransition {
        workflow_id: String,
        from: WorkflowStatus,
        to: WorkflowStatus,
    },

    #[error("invalid agent: {0}")]
    InvalidAgent(String),

    #[error("agents not registered: {}", .0.join(", "))]
    UnknownAgents(Vec<String>),

    #[error("agent '{agent}' depends on '{dependency}', which is not part of the workflow")]
    UnsatisfiableDependency { agent: String, dependency: String },

    #[error("dependency cycle: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("agent '{0}' is scheduled more than once")]
    DuplicateAgent(String),

    #[error("workflow has no tasks to execute")]
    EmptyWorkflow,

    #[error("workflow builder: {0}")]
    Builder(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal orchestrator error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
