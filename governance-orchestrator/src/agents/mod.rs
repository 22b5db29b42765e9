//! Agent registry types, the built-in agent names, and the mock agent.

pub mod mock;

pub use mock::MockAgent;

use governance_sdk::GovernanceAgent;
use std::collections::HashMap;
use std::sync::Arc;

pub const RISK_AGENT: &str = "risk_agent";
pub const BIAS_AGENT: &str = "bias_agent";
pub const POLICY_AGENT: &str = "policy_agent";
pub const AUDIT_AGENT: &str = "audit_agent";
pub const LIABILITY_AGENT: &str = "liability_protection_agent";

/// The five agents the workflow templates refer to
pub const GOVERNANCE_AGENTS: [&str; 5] = [
    RISK_AGENT,
    BIAS_AGENT,
    POLICY_AGENT,
    AUDIT_AGENT,
    LIABILITY_AGENT,
];

/// Name -> capability mapping
pub type AgentRegistry = HashMap<String, Arc<dyn GovernanceAgent>>;
