use crate::types::{AgentInput, AgentResult};
use async_trait::async_trait;
use thiserror::Error;

/// Errors an agent may raise while producing an assessment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("agent execution failed: {0}")]
    Execution(String),

    #[error("invalid agent input: {0}")]
    InvalidInput(String),

    #[error("agent timed out after {0}s")]
    Timeout(u64),

    #[error("agent unavailable: {0}")]
    Unavailable(String),
}

/// Capability every governance agent provides
///
/// An `Ok` result whose status is `failed` is an explicit failure signal and
/// is retried the same way as an `Err`.
#[async_trait]
pub trait GovernanceAgent: Send + Sync {
    /// Category name reported in results (e.g. `risk_agent`)
    fn agent_type(&self) -> &str;

    /// Produce an assessment for the given context and upstream results
    async fn run(&self, input: AgentInput) -> Result<AgentResult, AgentError>;

    /// Report whether the agent can currently serve requests
    async fn health_check(&self) -> Result<bool, AgentError>;
}
