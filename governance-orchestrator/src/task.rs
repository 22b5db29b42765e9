//! Agent tasks and the fixed per-type workflow templates.

use governance_sdk::{Priority, WorkflowType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::time::Duration;

use crate::agents::{AUDIT_AGENT, BIAS_AGENT, LIABILITY_AGENT, POLICY_AGENT, RISK_AGENT};

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_RETRY_BUDGET: u32 = 2;

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_retry_budget() -> u32 {
    DEFAULT_RETRY_BUDGET
}

/// One scheduled invocation of a named agent within a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
    pub agent_name: String,

    pub priority: Priority,

    /// System context handed to the agent
    #[serde(default)]
    pub input_data: Map<String, Value>,

    /// Agents whose results must exist before this task runs
    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Retries still available after the first attempt
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
}

impl AgentTask {
    pub fn new(agent_name: impl Into<String>, priority: Priority) -> Self {
        Self {
            agent_name: agent_name.into(),
            priority,
            input_data: Map::new(),
            depends_on: Vec::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    /// Add dependencies, ignoring names already present
    pub fn depends_on<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for agent in agents {
            let agent = agent.into();
            if !self.depends_on.contains(&agent) {
                self.depends_on.push(agent);
            }
        }
        self
    }

    pub fn with_input(mut self, input_data: Map<String, Value>) -> Self {
        self.input_data = input_data;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_retry_budget(mut self, retries: u32) -> Self {
        self.retry_budget = retries;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn max_attempts(&self) -> u32 {
        self.retry_budget + 1
    }
}

/// Task list for a workflow type, before context and defaults are applied
pub fn template(workflow_type: WorkflowType) -> Vec<AgentTask> {
    match workflow_type {
        WorkflowType::ComprehensiveAssessment => vec![
            AgentTask::new(RISK_AGENT, Priority::Critical),
            AgentTask::new(BIAS_AGENT, Priority::High).depends_on([RISK_AGENT]),
            AgentTask::new(POLICY_AGENT, Priority::High).depends_on([RISK_AGENT]),
            AgentTask::new(AUDIT_AGENT, Priority::Medium).depends_on([
                RISK_AGENT,
                BIAS_AGENT,
                POLICY_AGENT,
            ]),
            AgentTask::new(LIABILITY_AGENT, Priority::Low).depends_on([AUDIT_AGENT]),
        ],
        WorkflowType::RiskFocused => vec![
            AgentTask::new(RISK_AGENT, Priority::Critical),
            AgentTask::new(LIABILITY_AGENT, Priority::High).depends_on([RISK_AGENT]),
        ],
        WorkflowType::ComplianceCheck => vec![
            AgentTask::new(POLICY_AGENT, Priority::Critical),
            AgentTask::new(AUDIT_AGENT, Priority::High).depends_on([POLICY_AGENT]),
        ],
        WorkflowType::BiasAudit => vec![
            AgentTask::new(BIAS_AGENT, Priority::Critical),
            AgentTask::new(AUDIT_AGENT, Priority::High).depends_on([BIAS_AGENT]),
        ],
        WorkflowType::RapidScreening => vec![AgentTask::new(RISK_AGENT, Priority::Critical)],
    }
}

/// One dependency-free `High` priority task per distinct named agent, in first-seen order
pub fn custom_tasks(agents: &[String]) -> Vec<AgentTask> {
    let mut seen = HashSet::new();
    agents
        .iter()
        .filter(|agent| seen.insert(agent.as_str()))
        .map(|agent| AgentTask::new(agent.clone(), Priority::High))
        .collect()
}
