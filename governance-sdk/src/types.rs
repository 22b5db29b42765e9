//! Result records and categorical values exchanged between agents and the orchestrator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing one of the categorical enums from a string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Categorical risk level reported by an agent
///
/// Variants are declared in ascending severity, so `Ord` follows the
/// `critical > high > medium > low` ranking used during aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    /// Severity rank: critical(4) > high(3) > medium(2) > low(1)
    pub fn severity(self) -> u8 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
            RiskLevel::Critical => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RiskLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("risk level", s))
    }
}

/// Compliance verdict reported by an agent
///
/// Any value an agent reports that is not one of the known verdicts
/// deserializes to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    Partial,
    NonCompliant,
    #[serde(other)]
    Unknown,
}

impl ComplianceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "compliant",
            ComplianceStatus::Partial => "partial",
            ComplianceStatus::NonCompliant => "non_compliant",
            ComplianceStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling priority of a task inside one execution level
///
/// Declared from most to least urgent so that an ascending sort puts
/// `Critical` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn value(self) -> u8 {
        match self {
            Priority::Critical => 1,
            Priority::High => 2,
            Priority::Medium => 3,
            Priority::Low => 4,
        }
    }
}

/// The closed set of workflow templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    ComprehensiveAssessment,
    RiskFocused,
    ComplianceCheck,
    BiasAudit,
    RapidScreening,
}

impl WorkflowType {
    pub const ALL: [WorkflowType; 5] = [
        WorkflowType::ComprehensiveAssessment,
        WorkflowType::RiskFocused,
        WorkflowType::ComplianceCheck,
        WorkflowType::BiasAudit,
        WorkflowType::RapidScreening,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowType::ComprehensiveAssessment => "comprehensive_assessment",
            WorkflowType::RiskFocused => "risk_focused",
            WorkflowType::ComplianceCheck => "compliance_check",
            WorkflowType::BiasAudit => "bias_audit",
            WorkflowType::RapidScreening => "rapid_screening",
        }
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowType::ALL
            .into_iter()
            .find(|wf| wf.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("workflow type", s))
    }
}

/// Lifecycle state of a workflow
///
/// Valid transitions: `Created -> Running -> {Completed, Failed}` and
/// `Created -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Created => "created",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }

    pub fn can_transition_to(self, next: WorkflowStatus) -> bool {
        matches!(
            (self, next),
            (WorkflowStatus::Created, WorkflowStatus::Running)
                | (WorkflowStatus::Created, WorkflowStatus::Cancelled)
                | (WorkflowStatus::Running, WorkflowStatus::Completed)
                | (WorkflowStatus::Running, WorkflowStatus::Failed)
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(WorkflowStatus::Created),
            "running" => Ok(WorkflowStatus::Running),
            "completed" => Ok(WorkflowStatus::Completed),
            "failed" => Ok(WorkflowStatus::Failed),
            "cancelled" => Ok(WorkflowStatus::Cancelled),
            _ => Err(ParseEnumError::new("workflow status", s)),
        }
    }
}

/// Terminal status of a single agent invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Completed,
    Failed,
}

/// Assessment payload of a successful agent run
///
/// Only the four fields below are interpreted by the orchestrator; anything
/// else an agent reports is kept in `details`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_status: Option<ComplianceStatus>,

    #[serde(default)]
    pub recommendations: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,

    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl AssessmentData {
    pub fn new(risk_level: RiskLevel, compliance_status: ComplianceStatus, confidence_score: f64) -> Self {
        Self {
            risk_level: Some(risk_level),
            compliance_status: Some(compliance_status),
            recommendations: Vec::new(),
            confidence_score: Some(confidence_score),
            details: Map::new(),
        }
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

/// Record produced by one task execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub status: AgentStatus,

    pub agent_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_data: Option<AssessmentData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall-clock seconds spent on the final attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,

    /// Number of invocations the retry controller made (0 when produced outside it)
    #[serde(default)]
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mock: bool,
}

impl AgentResult {
    pub fn completed(agent_type: impl Into<String>, assessment_data: AssessmentData) -> Self {
        Self {
            status: AgentStatus::Completed,
            agent_type: agent_type.into(),
            assessment_data: Some(assessment_data),
            error: None,
            execution_time: None,
            attempts: 0,
            mock: false,
        }
    }

    pub fn failed(agent_type: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: AgentStatus::Failed,
            agent_type: agent_type.into(),
            assessment_data: None,
            error: Some(error.into()),
            execution_time: None,
            attempts: 0,
            mock: false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == AgentStatus::Completed
    }

    pub fn with_execution_time(mut self, seconds: f64) -> Self {
        self.execution_time = Some(seconds);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn mocked(mut self) -> Self {
        self.mock = true;
        self
    }
}

/// Effective input handed to an agent
///
/// Serializes as the system context object with an extra
/// `previous_results` key holding the results of the agents this task
/// depends on. The key is omitted when the task has no dependencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInput {
    #[serde(flatten)]
    pub system_context: Map<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub previous_results: BTreeMap<String, AgentResult>,
}

impl AgentInput {
    pub fn new(system_context: Map<String, Value>) -> Self {
        Self {
            system_context,
            previous_results: BTreeMap::new(),
        }
    }

    pub fn with_previous_results(mut self, previous_results: BTreeMap<String, AgentResult>) -> Self {
        self.previous_results = previous_results;
        self
    }

    /// Result of an upstream agent this task declared a dependency on
    pub fn previous(&self, agent_name: &str) -> Option<&AgentResult> {
        self.previous_results.get(agent_name)
    }

    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.system_context.get(key).and_then(Value::as_str)
    }
}
