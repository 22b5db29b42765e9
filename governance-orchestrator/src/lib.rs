//! Dependency-aware orchestration of AI governance agents.
//!
//! A workflow is a set of agent tasks with dependencies. The planner groups
//! them into levels, the executor runs each level concurrently under a shared
//! worker pool, failed agents are retried within their budget, and the
//! results are aggregated into one assessment recorded in the audit trail.

// Agent registry and mock agent
pub mod agents;

// Result aggregation
pub mod aggregate;

// Audit trail and SQLite persistence
pub mod audit;
pub mod database;

pub mod cli;
pub mod config;
pub mod error;
pub mod events;

// Planning and execution
pub mod executor;
pub mod planner;
pub mod retry;
pub mod task;

pub mod factory;
pub mod orchestrator;
pub mod store;
pub mod workflow;

pub use aggregate::{aggregate, AggregatedAssessment, AssessmentSummary};
pub use audit::{AuditEvent, AuditSink, InMemoryAuditSink, NullAuditSink, SqliteAuditSink};
pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};
pub use factory::{OrchestratorFactory, PipelineType, WorkflowBuilder};
pub use orchestrator::{HealthReport, Orchestrator, OrchestratorStats};
pub use planner::ExecutionPlan;
pub use store::{InMemoryWorkflowStore, WorkflowStore};
pub use task::AgentTask;
pub use workflow::{WorkflowResult, WorkflowStatusReport};
