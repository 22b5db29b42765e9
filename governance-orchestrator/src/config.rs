//! Orchestrator configuration.
//!
//! Settings come from three layers, later ones winning:
//! built-in defaults, an optional YAML (or JSON) file, and `GOVERNANCE_*`
//! environment variables. A `.env` file in the working directory is loaded
//! before the environment is read.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::OrchestratorError;
use crate::task::{DEFAULT_RETRY_BUDGET, DEFAULT_TIMEOUT_SECS};

const ENV_MAX_WORKERS: &str = "GOVERNANCE_MAX_WORKERS";
const ENV_TIMEOUT: &str = "GOVERNANCE_DEFAULT_TIMEOUT_SECS";
const ENV_RETRY_BUDGET: &str = "GOVERNANCE_DEFAULT_RETRY_BUDGET";
const ENV_STRICT: &str = "GOVERNANCE_STRICT_VALIDATION";
const ENV_EVENT_CAPACITY: &str = "GOVERNANCE_EVENT_CAPACITY";
const ENV_DATABASE_PATH: &str = "GOVERNANCE_DATABASE_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Size of the worker pool shared by every running workflow
    pub max_workers: usize,

    /// Timeout applied to template and custom tasks
    pub default_timeout_secs: u64,

    /// Retries granted to each task after its first attempt
    pub default_retry_budget: u32,

    /// Reject unregistered agents and broken dependency graphs at creation time
    pub strict_validation: bool,

    /// Capacity of the progress event channel
    pub event_capacity: usize,

    /// SQLite file for the audit trail; `None` means the default location
    pub database_path: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_retry_budget: DEFAULT_RETRY_BUDGET,
            strict_validation: true,
            event_capacity: 1000,
            database_path: None,
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply `GOVERNANCE_*` overrides using the given lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> std::result::Result<(), OrchestratorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_WORKERS) {
            self.max_workers = parse_var(ENV_MAX_WORKERS, &value)?;
        }
        if let Some(value) = lookup(ENV_TIMEOUT) {
            self.default_timeout_secs = parse_var(ENV_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(ENV_RETRY_BUDGET) {
            self.default_retry_budget = parse_var(ENV_RETRY_BUDGET, &value)?;
        }
        if let Some(value) = lookup(ENV_STRICT) {
            self.strict_validation = parse_var(ENV_STRICT, &value)?;
        }
        if let Some(value) = lookup(ENV_EVENT_CAPACITY) {
            self.event_capacity = parse_var(ENV_EVENT_CAPACITY, &value)?;
        }
        if let Some(value) = lookup(ENV_DATABASE_PATH) {
            if !value.trim().is_empty() {
                self.database_path = Some(PathBuf::from(value));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), OrchestratorError> {
        if self.max_workers == 0 {
            return Err(OrchestratorError::Config(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.default_timeout_secs == 0 {
            return Err(OrchestratorError::Config(
                "default_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(OrchestratorError::Config(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Database location, falling back to `~/.governance-orchestrator/audit.db`
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path.clone().or_else(default_database_path)
    }
}

pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".governance-orchestrator").join("audit.db"))
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> std::result::Result<T, OrchestratorError> {
    value
        .trim()
        .parse()
        .map_err(|_| OrchestratorError::Config(format!("{} has an invalid value: '{}'", key, value)))
}
