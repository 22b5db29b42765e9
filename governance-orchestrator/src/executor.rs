//! Level-by-level execution of a plan.
//!
//! Levels run strictly in order. A level with a single task runs inline on
//! the caller's task; larger levels spawn one tokio task per agent, each
//! holding a permit from the orchestrator-wide worker pool while it runs.
//! Results of a level are merged before the next level builds its inputs.

use futures::{stream::FuturesUnordered, FutureExt, Stream, StreamExt};
use governance_sdk::{AgentInput, AgentResult, WorkflowEvent};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinError};
use tracing::{info, warn};

use crate::agents::AgentRegistry;
use crate::events::EventBus;
use crate::planner::ExecutionPlan;
use crate::retry::{execute_with_retry, panic_message, TaskOutcome};
use crate::task::{AgentTask, DEFAULT_TIMEOUT_SECS};

pub struct LevelExecutor {
    permits: Arc<Semaphore>,
    events: EventBus,
}

impl LevelExecutor {
    pub fn new(permits: Arc<Semaphore>, events: EventBus) -> Self {
        Self { permits, events }
    }

    /// Execute every level of the plan and return one result per scheduled agent
    ///
    /// `on_result` sees each task outcome as soon as it is known.
    pub async fn execute<F>(
        &self,
        workflow_id: &str,
        plan: &ExecutionPlan,
        agents: &AgentRegistry,
        context: &Map<String, Value>,
        mut on_result: F,
    ) -> BTreeMap<String, AgentResult>
    where
        F: FnMut(&TaskOutcome),
    {
        let mut results: BTreeMap<String, AgentResult> = BTreeMap::new();
        let total_levels = plan.total_levels();

        for (idx, level) in plan.levels.iter().enumerate() {
            let level_number = idx + 1;
            info!(
                workflow_id,
                level = level_number,
                total_levels,
                agents = level.len(),
                "Executing level"
            );
            self.events.publish(WorkflowEvent::LevelStarted {
                workflow_id: workflow_id.to_string(),
                level: level_number,
                total_levels,
                agents: level.iter().map(|t| t.agent_name.clone()).collect(),
            });

            if let [task] = level.as_slice() {
                let outcome = self
                    .run_inline(workflow_id, task, agents, context, &results)
                    .await;
                record(outcome, &mut results, &mut on_result);
            } else {
                self.run_concurrent(workflow_id, level, agents, context, &mut results, &mut on_result)
                    .await;
            }

            let completed = level
                .iter()
                .filter(|t| results.get(&t.agent_name).is_some_and(AgentResult::is_completed))
                .count();
            self.events.publish(WorkflowEvent::LevelCompleted {
                workflow_id: workflow_id.to_string(),
                level: level_number,
                completed,
                failed: level.len() - completed,
            });
        }

        for task in plan.levels.iter().flatten() {
            if !results.contains_key(&task.agent_name) {
                warn!(workflow_id, agent = %task.agent_name, "Agent produced no result");
                results.insert(
                    task.agent_name.clone(),
                    AgentResult::failed(&task.agent_name, "agent was not executed"),
                );
            }
        }

        results
    }

    async fn run_inline(
        &self,
        workflow_id: &str,
        task: &AgentTask,
        agents: &AgentRegistry,
        context: &Map<String, Value>,
        results: &BTreeMap<String, AgentResult>,
    ) -> TaskOutcome {
        match agents.get(&task.agent_name) {
            Some(agent) => {
                let input = build_input(task, context, results);
                execute_with_retry(workflow_id, Arc::clone(agent), task.clone(), input, &self.events)
                    .await
            }
            None => not_registered(task),
        }
    }

    async fn run_concurrent<F>(
        &self,
        workflow_id: &str,
        level: &[AgentTask],
        agents: &AgentRegistry,
        context: &Map<String, Value>,
        results: &mut BTreeMap<String, AgentResult>,
        on_result: &mut F,
    ) where
        F: FnMut(&TaskOutcome),
    {
        let level_timeout = level
            .iter()
            .map(|t| t.timeout_seconds)
            .max()
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(level_timeout);

        // Inputs only see earlier levels
        let inputs: Vec<AgentInput> = level
            .iter()
            .map(|task| build_input(task, context, results))
            .collect();

        let mut running: Vec<(AgentTask, AbortHandle)> = Vec::new();
        let mut pending = FuturesUnordered::new();

        for (task, input) in level.iter().zip(inputs) {
            let Some(agent) = agents.get(&task.agent_name).cloned() else {
                record(not_registered(task), results, on_result);
                continue;
            };

            let permits = Arc::clone(&self.permits);
            let events = self.events.clone();
            let wf_id = workflow_id.to_string();
            let owned = task.clone();

            let handle = tokio::spawn(async move {
                // Acquire permit (blocks while max_workers agents are running)
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return failed_outcome(owned, "worker pool closed".to_string()),
                };
                execute_with_retry(&wf_id, agent, owned, input, &events).await
            });

            running.push((task.clone(), handle.abort_handle()));
            let name = task.agent_name.clone();
            pending.push(async move { (name, handle.await) });
        }

        let mut finished: HashSet<String> = HashSet::new();

        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((name, joined))) => {
                    if let Some(outcome) = settle(&running, &name, joined) {
                        finished.insert(name);
                        record(outcome, results, on_result);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    // Tasks that completed at the deadline keep their results
                    for (name, joined) in drain_ready(&mut pending) {
                        if let Some(outcome) = settle(&running, &name, joined) {
                            finished.insert(name);
                            record(outcome, results, on_result);
                        }
                    }

                    for (task, abort) in &running {
                        if finished.contains(&task.agent_name) {
                            continue;
                        }
                        abort.abort();
                        warn!(
                            workflow_id,
                            agent = %task.agent_name,
                            "Level deadline reached after {}s, aborting agent",
                            level_timeout
                        );
                        let outcome =
                            failed_outcome(task.clone(), format!("timed out after {}s", level_timeout));
                        record(outcome, results, on_result);
                    }
                    break;
                }
            }
        }
    }
}

type Joined = (String, Result<TaskOutcome, JoinError>);

/// Joined outcomes that are already available, without waiting on the rest
fn drain_ready<S>(pending: &mut S) -> Vec<Joined>
where
    S: Stream<Item = Joined> + Unpin,
{
    let mut ready = Vec::new();
    while let Some(Some(joined)) = pending.next().now_or_never() {
        ready.push(joined);
    }
    ready
}

/// Turn a joined spawn into an outcome; panics and cancellations become failures
fn settle(
    running: &[(AgentTask, AbortHandle)],
    name: &str,
    joined: Result<TaskOutcome, JoinError>,
) -> Option<TaskOutcome> {
    match joined {
        Ok(outcome) => Some(outcome),
        Err(join_error) => {
            let reason = if join_error.is_panic() {
                format!(
                    "agent panicked: {}",
                    panic_message(join_error.into_panic().as_ref())
                )
            } else {
                "agent task was cancelled".to_string()
            };
            running
                .iter()
                .find(|(t, _)| t.agent_name == name)
                .map(|(task, _)| failed_outcome(task.clone(), reason))
        }
    }
}

/// System context merged with the task's own input plus the results of its dependencies
fn build_input(
    task: &AgentTask,
    context: &Map<String, Value>,
    results: &BTreeMap<String, AgentResult>,
) -> AgentInput {
    let mut system_context = context.clone();
    system_context.extend(task.input_data.clone());

    let previous_results = task
        .depends_on
        .iter()
        .filter_map(|dep| results.get(dep).map(|result| (dep.clone(), result.clone())))
        .collect();

    AgentInput::new(system_context).with_previous_results(previous_results)
}

fn record<F>(outcome: TaskOutcome, results: &mut BTreeMap<String, AgentResult>, on_result: &mut F)
where
    F: FnMut(&TaskOutcome),
{
    on_result(&outcome);
    results.insert(outcome.task.agent_name.clone(), outcome.result);
}

fn failed_outcome(task: AgentTask, error: String) -> TaskOutcome {
    let result = AgentResult::failed(&task.agent_name, error);
    TaskOutcome {
        task,
        result,
        attempts: 0,
    }
}

fn not_registered(task: &AgentTask) -> TaskOutcome {
    failed_outcome(
        task.clone(),
        format!("agent '{}' is not registered", task.agent_name),
    )
}
