//! Command-line arguments for the governance orchestrator binary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use governance_sdk::WorkflowType;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::factory::PipelineType;

/// Multi-agent AI governance assessment orchestrator
///
/// Runs the risk, bias, policy, audit and liability agents over a system
/// description in dependency order and prints the aggregated assessment.
#[derive(Parser, Debug, Clone)]
#[command(name = "governance-orchestrator")]
#[command(about = "Multi-agent AI governance assessment orchestrator")]
#[command(version)]
pub struct Cli {
    /// Path to a YAML or JSON configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// SQLite audit database (defaults to ~/.governance-orchestrator/audit.db)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create and execute one assessment workflow
    Run(RunArgs),

    /// Check the health of every agent in a pipeline
    Health {
        /// Agent selection (standard, rapid, compliance, risk)
        #[arg(long, default_value = "standard")]
        pipeline: PipelineType,
    },

    /// List the available workflow types
    Types,

    /// Show recent audit events from the database
    Audit {
        /// Maximum number of events to show
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Only show events with this action (workflow_completed, workflow_failed)
        #[arg(long)]
        action: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Workflow type (comprehensive_assessment, risk_focused, compliance_check,
    /// bias_audit, rapid_screening)
    #[arg(long = "type", value_name = "TYPE", default_value = "comprehensive_assessment")]
    pub workflow_type: WorkflowType,

    /// Path to the system context (JSON or YAML object)
    #[arg(long, value_name = "PATH")]
    pub context: PathBuf,

    /// Agent selection (standard, rapid, compliance, risk)
    #[arg(long, default_value = "standard")]
    pub pipeline: PipelineType,

    /// Run these agents instead of the workflow template (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "AGENTS")]
    pub agents: Option<Vec<String>>,

    /// Print human-readable progress while the workflow runs
    #[arg(long)]
    pub progress: bool,

    /// Emit structured progress events on stderr
    #[arg(long)]
    pub events: bool,

    /// Write the result JSON to this file instead of stdout
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Do not write the audit trail to the database
    #[arg(long)]
    pub no_db: bool,
}

impl RunArgs {
    /// Custom agent list, ignoring blank entries
    pub fn custom_agents(&self) -> Option<Vec<String>> {
        self.agents.as_ref().map(|agents| {
            agents
                .iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect()
        })
    }
}

/// Read a system context object from a JSON or YAML file
pub fn load_context(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file: {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let value: Value = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON context: {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML context: {}", path.display()))?
    };

    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!(
            "System context must be an object, got {} in {}",
            json_kind(&other),
            path.display()
        ),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
