//! Common test utilities for orchestrator tests

#![allow(dead_code)]

use anyhow::anyhow;
use governance_orchestrator::agents::{MockAgent, GOVERNANCE_AGENTS};
use governance_orchestrator::audit::InMemoryAuditSink;
use governance_orchestrator::store::{InMemoryWorkflowStore, WorkflowStore};
use governance_orchestrator::workflow::{HistoryEntry, Workflow};
use governance_orchestrator::{Orchestrator, OrchestratorConfig};
use governance_sdk::{
    async_trait, AgentError, AgentInput, AgentResult, AssessmentData, ComplianceStatus,
    GovernanceAgent, RiskLevel, WorkflowStatus,
};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Agent with a fixed assessment and configurable failures
pub struct ScriptedAgent {
    name: String,
    risk: RiskLevel,
    compliance: ComplianceStatus,
    confidence: f64,
    recommendations: Vec<String>,
    /// Number of leading attempts that fail
    fail_first: u32,
    always_fail: bool,
    report_failure: bool,
    delay: Option<Duration>,
    healthy: bool,
    calls: AtomicU32,
    inputs: Mutex<Vec<AgentInput>>,
}

impl ScriptedAgent {
    pub fn new(name: &str, risk: RiskLevel, compliance: ComplianceStatus, confidence: f64) -> Self {
        Self {
            name: name.to_string(),
            risk,
            compliance,
            confidence,
            recommendations: Vec::new(),
            fail_first: 0,
            always_fail: false,
            report_failure: false,
            delay: None,
            healthy: true,
            calls: AtomicU32::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Agent returning medium risk, partial compliance, confidence 7
    pub fn ok(name: &str) -> Self {
        Self::new(name, RiskLevel::Medium, ComplianceStatus::Partial, 7.0)
    }

    pub fn failing(name: &str) -> Self {
        Self {
            always_fail: true,
            ..Self::ok(name)
        }
    }

    pub fn fail_first(mut self, attempts: u32) -> Self {
        self.fail_first = attempts;
        self
    }

    /// Fail by returning `Ok` with a failed status instead of `Err`
    pub fn reporting_failure(mut self) -> Self {
        self.report_failure = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_recommendation(mut self, recommendation: &str) -> Self {
        self.recommendations.push(recommendation.to_string());
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<AgentInput> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl GovernanceAgent for ScriptedAgent {
    fn agent_type(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: AgentInput) -> Result<AgentResult, AgentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.inputs.lock().unwrap().push(input);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.always_fail || call <= self.fail_first {
            let message = format!("{} unavailable (call {})", self.name, call);
            if self.report_failure {
                return Ok(AgentResult::failed(&self.name, message));
            }
            return Err(AgentError::Execution(message));
        }

        let mut data = AssessmentData::new(self.risk, self.compliance, self.confidence);
        for recommendation in &self.recommendations {
            data = data.with_recommendation(recommendation.clone());
        }
        Ok(AgentResult::completed(&self.name, data))
    }

    async fn health_check(&self) -> Result<bool, AgentError> {
        Ok(self.healthy)
    }
}

/// Sample AI system description
pub fn system_context() -> Map<String, Value> {
    let mut ctx = Map::new();
    ctx.insert("system_name".to_string(), json!("Resume screener"));
    ctx.insert("domain".to_string(), json!("hiring"));
    ctx.insert("data_sources".to_string(), json!(["applications", "hr_records"]));
    ctx
}

pub fn config() -> OrchestratorConfig {
    OrchestratorConfig::default()
}

pub fn legacy_config() -> OrchestratorConfig {
    OrchestratorConfig {
        strict_validation: false,
        ..OrchestratorConfig::default()
    }
}

/// Orchestrator with an in-memory audit sink the test can inspect
pub fn orchestrator_with_audit(config: OrchestratorConfig) -> (Orchestrator, Arc<InMemoryAuditSink>) {
    let audit = Arc::new(InMemoryAuditSink::new());
    let orchestrator = Orchestrator::new(
        config,
        Arc::new(InMemoryWorkflowStore::new()),
        audit.clone(),
    );
    (orchestrator, audit)
}

/// Register agents by name
pub fn register(orchestrator: &Orchestrator, agents: &[(&str, Arc<dyn GovernanceAgent>)]) {
    for (name, agent) in agents {
        orchestrator.register_agent(*name, Arc::clone(agent)).unwrap();
    }
}

/// Orchestrator with all five agents backed by mocks
pub fn mock_orchestrator() -> Orchestrator {
    let orchestrator = Orchestrator::with_defaults();
    for name in GOVERNANCE_AGENTS {
        orchestrator
            .register_agent(name, Arc::new(MockAgent::new(name)))
            .unwrap();
    }
    orchestrator
}

/// Store whose history rejects completed workflows
#[derive(Default)]
pub struct RejectingHistoryStore {
    inner: InMemoryWorkflowStore,
}

impl WorkflowStore for RejectingHistoryStore {
    fn insert(&self, workflow: Workflow) -> anyhow::Result<()> {
        self.inner.insert(workflow)
    }

    fn get(&self, id: &str) -> anyhow::Result<Option<Workflow>> {
        self.inner.get(id)
    }

    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Workflow)) -> anyhow::Result<bool> {
        self.inner.update(id, f)
    }

    fn remove(&self, id: &str) -> anyhow::Result<Option<Workflow>> {
        self.inner.remove(id)
    }

    fn push_history(&self, entry: HistoryEntry) -> anyhow::Result<()> {
        if entry.workflow.status == WorkflowStatus::Completed {
            return Err(anyhow!("history storage full"));
        }
        self.inner.push_history(entry)
    }

    fn history(&self) -> anyhow::Result<Vec<HistoryEntry>> {
        self.inner.history()
    }

    fn find_history(&self, id: &str) -> anyhow::Result<Option<HistoryEntry>> {
        self.inner.find_history(id)
    }

    fn active_count(&self) -> anyhow::Result<usize> {
        self.inner.active_count()
    }

    fn history_count(&self) -> anyhow::Result<usize> {
        self.inner.history_count()
    }
}
