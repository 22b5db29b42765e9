use governance_sdk::{
    async_trait, AgentError, AgentInput, AgentResult, AssessmentData, ComplianceStatus,
    GovernanceAgent, RiskLevel,
};

/// Stand-in agent that returns a fixed medium-risk, partially compliant assessment
///
/// Results are flagged with `mock: true` so they are distinguishable from real
/// assessments in the audit trail.
#[derive(Debug, Clone)]
pub struct MockAgent {
    agent_type: String,
}

impl MockAgent {
    pub fn new(agent_type: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
        }
    }
}

#[async_trait]
impl GovernanceAgent for MockAgent {
    fn agent_type(&self) -> &str {
        &self.agent_type
    }

    async fn run(&self, _input: AgentInput) -> Result<AgentResult, AgentError> {
        let assessment = AssessmentData::new(RiskLevel::Medium, ComplianceStatus::Partial, 6.0)
            .with_recommendation(format!("Mock recommendation from {}", self.agent_type));

        Ok(AgentResult::completed(&self.agent_type, assessment).mocked())
    }

    async fn health_check(&self) -> Result<bool, AgentError> {
        Ok(true)
    }
}
