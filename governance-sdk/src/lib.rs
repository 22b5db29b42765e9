mod agent;
mod types;

pub use agent::{AgentError, GovernanceAgent};
pub use types::{
    AgentInput, AgentResult, AgentStatus, AssessmentData, ComplianceStatus, ParseEnumError,
    Priority, RiskLevel, WorkflowStatus, WorkflowType,
};

use serde::{Deserialize, Serialize};

// Re-export async trait for convenience
pub use async_trait::async_trait;

/// Structured progress events published while a workflow runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Workflow moved from created to running
    WorkflowStarted {
        workflow_id: String,
        workflow_type: WorkflowType,
        total_tasks: usize,
    },
    /// Execution level started (1-based)
    LevelStarted {
        workflow_id: String,
        level: usize,
        total_levels: usize,
        agents: Vec<String>,
    },
    /// Every task of the level has a result
    LevelCompleted {
        workflow_id: String,
        level: usize,
        completed: usize,
        failed: usize,
    },
    AgentStarted {
        workflow_id: String,
        agent_name: String,
    },
    /// A failed attempt is about to be retried
    AgentRetrying {
        workflow_id: String,
        agent_name: String,
        attempt: u32,
        error: String,
    },
    AgentCompleted {
        workflow_id: String,
        agent_name: String,
        attempts: u32,
        execution_time: Option<f64>,
    },
    AgentFailed {
        workflow_id: String,
        agent_name: String,
        attempts: u32,
        error: String,
    },
    WorkflowCompleted {
        workflow_id: String,
        execution_time: f64,
    },
    WorkflowFailed {
        workflow_id: String,
        error: String,
    },
    WorkflowCancelled {
        workflow_id: String,
    },
}

impl WorkflowEvent {
    pub fn workflow_id(&self) -> &str {
        match self {
            WorkflowEvent::WorkflowStarted { workflow_id, .. }
            | WorkflowEvent::LevelStarted { workflow_id, .. }
            | WorkflowEvent::LevelCompleted { workflow_id, .. }
            | WorkflowEvent::AgentStarted { workflow_id, .. }
            | WorkflowEvent::AgentRetrying { workflow_id, .. }
            | WorkflowEvent::AgentCompleted { workflow_id, .. }
            | WorkflowEvent::AgentFailed { workflow_id, .. }
            | WorkflowEvent::WorkflowCompleted { workflow_id, .. }
            | WorkflowEvent::WorkflowFailed { workflow_id, .. }
            | WorkflowEvent::WorkflowCancelled { workflow_id } => workflow_id,
        }
    }

    /// Emit this event to stderr as a single prefixed JSON line
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            use std::io::Write;
            eprintln!("__GOV_EVENT__:{}", json);
            // Force flush stderr in async/concurrent contexts
            let _ = std::io::stderr().flush();
        }
    }
}

// ============================================================================
// Console Logging Macros (for the CLI progress view)
// ============================================================================
// Colored human-readable lines, complementing the structured WorkflowEvent
// stream.
// ============================================================================

/// Logs the start of an execution level.
///
/// # Example
/// ```
/// use governance_sdk::log_level_start;
/// log_level_start!(2, 4, 2);
/// ```
///
/// Outputs:
/// ```text
/// → Executing Level 2/4 (2 agents)
/// ```
#[macro_export]
macro_rules! log_level_start {
    ($level:expr, $total_levels:expr, $num_agents:expr) => {
        println!(
            "\x1b[36m→ Executing Level {}/{} ({} agents)\x1b[0m",
            $level, $total_levels, $num_agents
        );
    };
}

/// Logs the completion of an execution level.
///
/// # Example
/// ```
/// use governance_sdk::log_level_complete;
/// log_level_complete!(2, 1, 1);
/// ```
///
/// Outputs:
/// ```text
/// ✓ Level 2 complete (1 completed, 1 failed)
/// ```
#[macro_export]
macro_rules! log_level_complete {
    ($level:expr, $completed:expr, $failed:expr) => {
        println!(
            "\x1b[32m✓ Level {} complete ({} completed, {} failed)\x1b[0m",
            $level, $completed, $failed
        );
    };
}

/// Logs a successful agent run.
///
/// # Example
/// ```
/// use governance_sdk::log_agent_done;
/// log_agent_done!("risk_agent", 1);
/// ```
#[macro_export]
macro_rules! log_agent_done {
    ($agent:expr, $attempts:expr) => {
        println!(
            "\x1b[32m  ✓ @{} complete (attempts: {})\x1b[0m",
            $agent, $attempts
        );
    };
}

/// Logs an agent that exhausted its attempts.
///
/// # Example
/// ```
/// use governance_sdk::log_agent_error;
/// log_agent_error!("bias_agent", "upstream model unavailable");
/// ```
#[macro_export]
macro_rules! log_agent_error {
    ($agent:expr, $error:expr) => {
        println!("\x1b[31m  ✗ @{} failed: {}\x1b[0m", $agent, $error);
    };
}

/// Logs a retry of a failed agent attempt.
///
/// # Example
/// ```
/// use governance_sdk::log_agent_retry;
/// log_agent_retry!("bias_agent", 2, "connection reset");
/// ```
///
/// Outputs:
/// ```text
///   ↻ @bias_agent attempt 2 failed, retrying: connection reset
/// ```
#[macro_export]
macro_rules! log_agent_retry {
    ($agent:expr, $attempt:expr, $error:expr) => {
        println!(
            "\x1b[33m  ↻ @{} attempt {} failed, retrying: {}\x1b[0m",
            $agent, $attempt, $error
        );
    };
}

/// Logs an informational message.
///
/// # Example
/// ```
/// use governance_sdk::log_info;
/// log_info!("Loading context...");
/// let count = 3;
/// log_info!("Registered {} agents", count);
/// ```
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
///
/// # Example
/// ```
/// use governance_sdk::log_warning;
/// log_warning!("Using mock agent for policy_agent");
/// ```
///
/// Outputs:
/// ```text
/// ⚠ Warning: Using mock agent for policy_agent
/// ```
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}
