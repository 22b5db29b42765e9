//! Pre-configured orchestrators and the custom workflow builder.

use governance_sdk::{GovernanceAgent, WorkflowType};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::agents::{MockAgent, AUDIT_AGENT, BIAS_AGENT, LIABILITY_AGENT, POLICY_AGENT, RISK_AGENT};
use crate::audit::{AuditSink, InMemoryAuditSink};
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::orchestrator::Orchestrator;
use crate::store::{InMemoryWorkflowStore, WorkflowStore};

/// Named agent selections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineType {
    /// All five agents
    #[default]
    Standard,
    /// Risk agent only
    Rapid,
    /// Policy and audit agents
    Compliance,
    /// Risk, bias and liability agents
    Risk,
}

impl PipelineType {
    pub const ALL: [PipelineType; 4] = [
        PipelineType::Standard,
        PipelineType::Rapid,
        PipelineType::Compliance,
        PipelineType::Risk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineType::Standard => "standard",
            PipelineType::Rapid => "rapid",
            PipelineType::Compliance => "compliance",
            PipelineType::Risk => "risk",
        }
    }

    pub fn agents_config(self) -> AgentsConfig {
        match self {
            PipelineType::Standard => AgentsConfig::all(),
            PipelineType::Rapid => AgentsConfig {
                risk_agent: true,
                ..AgentsConfig::none()
            },
            PipelineType::Compliance => AgentsConfig {
                policy_agent: true,
                audit_agent: true,
                ..AgentsConfig::none()
            },
            PipelineType::Risk => AgentsConfig {
                risk_agent: true,
                bias_agent: true,
                liability_protection_agent: true,
                ..AgentsConfig::none()
            },
        }
    }
}

impl fmt::Display for PipelineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineType {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        PipelineType::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                let available: Vec<&str> = PipelineType::ALL.iter().map(|p| p.as_str()).collect();
                OrchestratorError::Config(format!(
                    "Unknown pipeline type: {}. Available types: {}",
                    s,
                    available.join(", ")
                ))
            })
    }
}

/// Which of the five governance agents a pipeline registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentsConfig {
    pub risk_agent: bool,
    pub bias_agent: bool,
    pub policy_agent: bool,
    pub audit_agent: bool,
    pub liability_protection_agent: bool,
}

impl AgentsConfig {
    pub fn all() -> Self {
        Self {
            risk_agent: true,
            bias_agent: true,
            policy_agent: true,
            audit_agent: true,
            liability_protection_agent: true,
        }
    }

    pub fn none() -> Self {
        Self {
            risk_agent: false,
            bias_agent: false,
            policy_agent: false,
            audit_agent: false,
            liability_protection_agent: false,
        }
    }

    /// Enabled agent names in template order
    pub fn enabled(&self) -> Vec<&'static str> {
        [
            (RISK_AGENT, self.risk_agent),
            (BIAS_AGENT, self.bias_agent),
            (POLICY_AGENT, self.policy_agent),
            (AUDIT_AGENT, self.audit_agent),
            (LIABILITY_AGENT, self.liability_protection_agent),
        ]
        .into_iter()
        .filter_map(|(name, enabled)| enabled.then_some(name))
        .collect()
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self::all()
    }
}

/// Builds orchestrators with a pipeline's agents registered
///
/// Agents without a supplied implementation are backed by [`MockAgent`].
pub struct OrchestratorFactory {
    config: OrchestratorConfig,
    store: Arc<dyn WorkflowStore>,
    audit: Arc<dyn AuditSink>,
    agents: HashMap<String, Arc<dyn GovernanceAgent>>,
}

impl OrchestratorFactory {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            store: Arc::new(InMemoryWorkflowStore::new()),
            audit: Arc::new(InMemoryAuditSink::new()),
            agents: HashMap::new(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn WorkflowStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Supply the implementation for one agent name
    pub fn with_agent(mut self, name: impl Into<String>, agent: Arc<dyn GovernanceAgent>) -> Self {
        self.agents.insert(name.into(), agent);
        self
    }

    pub fn build(self, pipeline: PipelineType) -> Result<Orchestrator> {
        self.build_with(pipeline.agents_config())
    }

    pub fn build_with(mut self, agents_config: AgentsConfig) -> Result<Orchestrator> {
        let orchestrator = Orchestrator::new(self.config, self.store, self.audit);

        for name in agents_config.enabled() {
            let agent = match self.agents.remove(name) {
                Some(agent) => agent,
                None => {
                    warn!(agent = name, "Agent implementation not available - using mock agent");
                    Arc::new(MockAgent::new(name))
                }
            };
            orchestrator.register_agent(name, agent)?;
        }

        info!(
            agents = orchestrator.available_agents().len(),
            "Created orchestrator"
        );
        Ok(orchestrator)
    }
}

/// Fluent construction of a custom-agent workflow
///
/// ```rust,no_run
/// use governance_orchestrator::factory::{OrchestratorFactory, PipelineType, WorkflowBuilder};
/// use governance_orchestrator::OrchestratorConfig;
/// use serde_json::{json, Map};
///
/// # fn main() -> anyhow::Result<()> {
/// let orchestrator = OrchestratorFactory::new(OrchestratorConfig::default())
///     .build(PipelineType::Standard)?;
///
/// let mut context = Map::new();
/// context.insert("system_name".to_string(), json!("Resume screener"));
///
/// let workflow_id = WorkflowBuilder::new(&orchestrator)
///     .add_agent("risk_agent")
///     .add_agent("bias_agent")
///     .set_context(context)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct WorkflowBuilder<'a> {
    orchestrator: &'a Orchestrator,
    custom_agents: Vec<String>,
    system_context: Map<String, Value>,
    workflow_type: WorkflowType,
}

impl<'a> WorkflowBuilder<'a> {
    pub fn new(orchestrator: &'a Orchestrator) -> Self {
        Self {
            orchestrator,
            custom_agents: Vec::new(),
            system_context: Map::new(),
            workflow_type: WorkflowType::ComprehensiveAssessment,
        }
    }

    /// Add a registered agent; unknown names are skipped with a warning
    pub fn add_agent(mut self, agent_type: impl Into<String>) -> Self {
        let agent_type = agent_type.into();
        if self.orchestrator.available_agents().contains(&agent_type) {
            if !self.custom_agents.contains(&agent_type) {
                self.custom_agents.push(agent_type);
            }
        } else {
            warn!(agent = %agent_type, "Agent not available in orchestrator");
        }
        self
    }

    pub fn set_context(mut self, context: Map<String, Value>) -> Self {
        self.system_context = context;
        self
    }

    pub fn workflow_type(mut self, workflow_type: WorkflowType) -> Self {
        self.workflow_type = workflow_type;
        self
    }

    /// Create the workflow and return its id
    pub fn build(self) -> Result<String> {
        if self.custom_agents.is_empty() {
            return Err(OrchestratorError::Builder(
                "No valid agents specified for workflow".to_string(),
            ));
        }
        if self.system_context.is_empty() {
            return Err(OrchestratorError::Builder(
                "System context must be provided".to_string(),
            ));
        }

        self.orchestrator.create_workflow(
            self.workflow_type,
            self.system_context,
            Some(self.custom_agents.as_slice()),
        )
    }
}
