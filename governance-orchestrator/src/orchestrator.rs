//! Workflow lifecycle: creation, execution, cancellation and health.

use chrono::Local;
use futures::future::join_all;
use futures::FutureExt;
use governance_sdk::{GovernanceAgent, WorkflowEvent, WorkflowStatus, WorkflowType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{broadcast, Semaphore};
use tracing::{error, info, warn};

use crate::agents::AgentRegistry;
use crate::aggregate::aggregate;
use crate::audit::{AuditEvent, AuditSink, InMemoryAuditSink};
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::events::EventBus;
use crate::executor::LevelExecutor;
use crate::planner;
use crate::store::{InMemoryWorkflowStore, WorkflowStore};
use crate::task::{self, AgentTask};
use crate::workflow::{
    ExecutionMetadata, HistoryEntry, Workflow, WorkflowResult, WorkflowStatusReport,
};

/// Health of the orchestrator and every registered agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub orchestrator_status: String,
    pub agent_health: BTreeMap<String, bool>,
    pub healthy_agents: usize,
    pub total_agents: usize,
    pub active_workflows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub registered_agents: Vec<String>,
    pub active_workflows: usize,
    pub completed_workflows: usize,
    pub total_workflows: usize,
    pub available_workflow_types: Vec<WorkflowType>,
    pub max_workers: usize,
}

/// Coordinates governance agents over dependency-ordered workflows
///
/// Workflows live in the [`WorkflowStore`] while `created` or `running` and
/// move to its history once they reach a terminal status. Every finished run
/// writes one event to the [`AuditSink`].
pub struct Orchestrator {
    config: OrchestratorConfig,
    agents: RwLock<AgentRegistry>,
    store: Arc<dyn WorkflowStore>,
    audit: Arc<dyn AuditSink>,
    executor: LevelExecutor,
    events: EventBus,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn WorkflowStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let mut config = config;
        if let Err(e) = config.validate() {
            warn!(error = %e, "Raising zero-valued limits to 1");
            config.max_workers = config.max_workers.max(1);
            config.default_timeout_secs = config.default_timeout_secs.max(1);
            config.event_capacity = config.event_capacity.max(1);
        }

        let events = EventBus::new(config.event_capacity);
        let permits = Arc::new(Semaphore::new(config.max_workers));
        let executor = LevelExecutor::new(permits, events.clone());

        Self {
            config,
            agents: RwLock::new(AgentRegistry::new()),
            store,
            audit,
            executor,
            events,
        }
    }

    /// Default configuration with in-memory storage and audit trail
    pub fn with_defaults() -> Self {
        Self::new(
            OrchestratorConfig::default(),
            Arc::new(InMemoryWorkflowStore::new()),
            Arc::new(InMemoryAuditSink::new()),
        )
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Register an agent under `name`, replacing any previous registration
    pub fn register_agent(&self, name: impl Into<String>, agent: Arc<dyn GovernanceAgent>) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(OrchestratorError::InvalidAgent(
                "agent name must not be empty".to_string(),
            ));
        }

        let mut agents = self.agents.write().unwrap_or_else(PoisonError::into_inner);
        if agents.insert(name.clone(), agent).is_some() {
            warn!(agent = %name, "Replacing registered agent");
        }
        info!(agent = %name, "Registered governance agent");
        Ok(())
    }

    /// Registered agent names, sorted
    pub fn available_agents(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot_agents().into_keys().collect();
        names.sort();
        names
    }

    fn snapshot_agents(&self) -> AgentRegistry {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Create a workflow from its type template or a custom agent list
    ///
    /// An empty custom list falls back to the template. Returns the new
    /// workflow id; the workflow starts in `created`.
    pub fn create_workflow(
        &self,
        workflow_type: WorkflowType,
        system_context: Map<String, Value>,
        custom_agents: Option<&[String]>,
    ) -> Result<String> {
        let mut tasks = match custom_agents {
            Some(agents) if !agents.is_empty() => task::custom_tasks(agents),
            _ => task::template(workflow_type),
        };

        let registered = self.snapshot_agents();
        let unknown: Vec<String> = tasks
            .iter()
            .filter(|t| !registered.contains_key(&t.agent_name))
            .map(|t| t.agent_name.clone())
            .collect();

        if self.config.strict_validation {
            if !unknown.is_empty() {
                return Err(OrchestratorError::UnknownAgents(unknown));
            }
            planner::validate_dependencies(&tasks)?;
            if tasks.is_empty() {
                return Err(OrchestratorError::EmptyWorkflow);
            }
        } else if !unknown.is_empty() {
            warn!(
                workflow_type = %workflow_type,
                agents = ?unknown,
                "Dropping unregistered agents from workflow"
            );
            tasks.retain(|t| registered.contains_key(&t.agent_name));
        }

        let tasks: Vec<AgentTask> = tasks
            .into_iter()
            .map(|t| {
                t.with_input(system_context.clone())
                    .with_timeout(self.config.default_timeout_secs)
                    .with_retry_budget(self.config.default_retry_budget)
            })
            .collect();

        let workflow = Workflow::new(workflow_type, tasks, system_context);
        let workflow_id = workflow.id.clone();
        info!(
            workflow_id = %workflow_id,
            workflow_type = %workflow_type,
            tasks = workflow.tasks.len(),
            "Created workflow"
        );
        self.store.insert(workflow)?;

        Ok(workflow_id)
    }

    /// Run a `created` workflow to completion
    ///
    /// Agent failures are part of the result; only storage faults and
    /// lifecycle violations are returned as errors.
    pub async fn execute_workflow(&self, workflow_id: &str) -> Result<WorkflowResult> {
        let workflow = self.begin(workflow_id)?;

        match self.run(workflow).await {
            Ok(result) => Ok(result),
            Err(err) => {
                self.fail(workflow_id, &err);
                Err(err)
            }
        }
    }

    /// Atomically move `created -> running` and return the started workflow
    fn begin(&self, workflow_id: &str) -> Result<Workflow> {
        let mut started: Option<Result<Workflow>> = None;
        let found = self.store.update(workflow_id, &mut |wf: &mut Workflow| {
            started = Some(wf.transition(WorkflowStatus::Running).map(|_| wf.clone()));
        })?;

        if !found {
            return match self.store.find_history(workflow_id)? {
                Some(entry) => Err(OrchestratorError::InvalidTransition {
                    workflow_id: workflow_id.to_string(),
                    from: entry.workflow.status,
                    to: WorkflowStatus::Running,
                }),
                None => Err(OrchestratorError::NotFound(workflow_id.to_string())),
            };
        }

        started.unwrap_or_else(|| {
            Err(OrchestratorError::Internal(format!(
                "workflow {} vanished while starting",
                workflow_id
            )))
        })
    }

    async fn run(&self, workflow: Workflow) -> Result<WorkflowResult> {
        let workflow_id = workflow.id.clone();
        let agents = self.snapshot_agents();

        info!(
            workflow_id = %workflow_id,
            workflow_type = %workflow.workflow_type,
            "Starting workflow execution"
        );
        self.events.publish(WorkflowEvent::WorkflowStarted {
            workflow_id: workflow_id.clone(),
            workflow_type: workflow.workflow_type,
            total_tasks: workflow.tasks.len(),
        });

        let plan = planner::plan(&workflow.tasks);
        let store = Arc::clone(&self.store);
        let results = self
            .executor
            .execute(
                &workflow_id,
                &plan,
                &agents,
                &workflow.system_context,
                |outcome| {
                    let recorded = store.update(&workflow_id, &mut |wf: &mut Workflow| {
                        wf.record_outcome(outcome)
                    });
                    if let Err(e) = recorded {
                        warn!(
                            workflow_id = %workflow_id,
                            agent = %outcome.task.agent_name,
                            "Failed to record agent result: {}",
                            e
                        );
                    }
                },
            )
            .await;

        let aggregated_assessment = aggregate(&results, workflow.workflow_type);

        let mut workflow = self.store.get(&workflow_id)?.ok_or_else(|| {
            OrchestratorError::Internal(format!(
                "workflow {} left the active set while running",
                workflow_id
            ))
        })?;
        workflow.results = results.clone();
        workflow.transition(WorkflowStatus::Completed)?;

        let end_time = workflow.completed_at.unwrap_or_else(Local::now);
        let start_time = workflow.started_at.unwrap_or(end_time);
        let result = WorkflowResult {
            workflow_id: workflow_id.clone(),
            workflow_type: workflow.workflow_type,
            status: WorkflowStatus::Completed,
            start_time,
            end_time,
            agent_results: results,
            aggregated_assessment,
            execution_metadata: ExecutionMetadata {
                execution_time_seconds: workflow.elapsed_seconds().unwrap_or_default(),
                agents_executed: workflow.results.keys().cloned().collect(),
                total_agents: workflow.tasks.len(),
            },
        };

        // Stays active until history has it, so a storage fault can still fail it
        self.store.push_history(HistoryEntry {
            workflow,
            result: Some(result.clone()),
        })?;
        self.store.remove(&workflow_id)?;

        self.write_audit(&AuditEvent::workflow_completed(&result));
        if let Err(e) = self.audit.record_workflow(&result) {
            error!(workflow_id = %workflow_id, "Failed to persist workflow result: {}", e);
        }

        info!(
            workflow_id = %workflow_id,
            execution_time = result.execution_metadata.execution_time_seconds,
            "Workflow completed"
        );
        self.events.publish(WorkflowEvent::WorkflowCompleted {
            workflow_id,
            execution_time: result.execution_metadata.execution_time_seconds,
        });

        Ok(result)
    }

    /// Record an execution fault: `running -> failed`, history, audit
    fn fail(&self, workflow_id: &str, err: &OrchestratorError) {
        let message = err.to_string();
        error!(workflow_id, "Workflow execution failed: {}", message);

        let failed = match self.store.remove(workflow_id) {
            Ok(Some(mut workflow)) => {
                if let Err(e) = workflow.transition(WorkflowStatus::Failed) {
                    warn!(workflow_id, "{}", e);
                }
                workflow.error = Some(message.clone());
                Some(workflow)
            }
            Ok(None) => None,
            Err(e) => {
                error!(workflow_id, "Failed to remove workflow from active set: {}", e);
                None
            }
        };

        if let Some(workflow) = failed {
            self.write_audit(&AuditEvent::workflow_failed(&workflow, &message));
            if let Err(e) = self.store.push_history(HistoryEntry {
                workflow,
                result: None,
            }) {
                error!(workflow_id, "Failed to record workflow history: {}", e);
            }
        }

        self.events.publish(WorkflowEvent::WorkflowFailed {
            workflow_id: workflow_id.to_string(),
            error: message,
        });
    }

    fn write_audit(&self, event: &AuditEvent) {
        if let Err(e) = self.audit.log_audit_event(event) {
            error!(
                workflow_id = %event.details.workflow_id,
                action = %event.action,
                "Failed to write audit event: {}",
                e
            );
        }
    }

    /// Current status of an active or finished workflow
    pub fn get_workflow_status(&self, workflow_id: &str) -> Result<Option<WorkflowStatusReport>> {
        if let Some(workflow) = self.store.get(workflow_id)? {
            return Ok(Some(WorkflowStatusReport::Active {
                id: workflow.id,
                status: workflow.status,
                progress: workflow.progress,
                created_at: workflow.created_at,
            }));
        }

        Ok(self
            .store
            .find_history(workflow_id)?
            .as_ref()
            .map(WorkflowStatusReport::from))
    }

    /// Result of a completed workflow
    pub fn workflow_result(&self, workflow_id: &str) -> Result<Option<WorkflowResult>> {
        Ok(self
            .store
            .find_history(workflow_id)?
            .and_then(|entry| entry.result))
    }

    /// Cancel a workflow that has not started yet
    ///
    /// Returns `false` for unknown workflows and for any status other than
    /// `created`.
    pub fn cancel_workflow(&self, workflow_id: &str) -> Result<bool> {
        let mut cancelled = false;
        self.store.update(workflow_id, &mut |wf: &mut Workflow| {
            cancelled = wf.transition(WorkflowStatus::Cancelled).is_ok();
        })?;

        if !cancelled {
            return Ok(false);
        }

        if let Some(workflow) = self.store.remove(workflow_id)? {
            self.store.push_history(HistoryEntry {
                workflow,
                result: None,
            })?;
        }

        info!(workflow_id, "Workflow cancelled");
        self.events.publish(WorkflowEvent::WorkflowCancelled {
            workflow_id: workflow_id.to_string(),
        });
        Ok(true)
    }

    /// Probe every registered agent concurrently
    ///
    /// An agent that errors, reports `false` or panics counts as unhealthy.
    pub async fn health_check(&self) -> Result<HealthReport> {
        let checks = self.snapshot_agents().into_iter().map(|(name, agent)| async move {
            let healthy = match AssertUnwindSafe(agent.health_check()).catch_unwind().await {
                Ok(Ok(healthy)) => healthy,
                Ok(Err(e)) => {
                    error!(agent = %name, "Health check failed: {}", e);
                    false
                }
                Err(_) => {
                    error!(agent = %name, "Health check panicked");
                    false
                }
            };
            (name, healthy)
        });

        let agent_health: BTreeMap<String, bool> = join_all(checks).await.into_iter().collect();

        Ok(HealthReport {
            orchestrator_status: "healthy".to_string(),
            healthy_agents: agent_health.values().filter(|h| **h).count(),
            total_agents: agent_health.len(),
            agent_health,
            active_workflows: self.store.active_count()?,
        })
    }

    pub fn stats(&self) -> Result<OrchestratorStats> {
        let active_workflows = self.store.active_count()?;
        let completed_workflows = self.store.history_count()?;

        Ok(OrchestratorStats {
            registered_agents: self.available_agents(),
            active_workflows,
            completed_workflows,
            total_workflows: active_workflows + completed_workflows,
            available_workflow_types: WorkflowType::ALL.to_vec(),
            max_workers: self.config.max_workers,
        })
    }

    /// Progress events of every workflow run by this orchestrator
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }
}
