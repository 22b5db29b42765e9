//! Task execution with bounded retries.
//!
//! Wraps a single agent invocation the way every task in a workflow is run:
//! failures (an `Err`, a panic, or an `Ok` result reporting `failed`) are
//! retried immediately while the task has budget left, and the whole task,
//! all attempts included, is bounded by its `timeout_seconds`.

use futures::FutureExt;
use governance_sdk::{AgentInput, AgentResult, GovernanceAgent, WorkflowEvent};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::events::EventBus;
use crate::task::AgentTask;

/// Terminal outcome of one task
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// The task with its retry budget reduced by the retries consumed
    pub task: AgentTask,
    pub result: AgentResult,
    pub attempts: u32,
}

/// Run a task against its agent until it succeeds, exhausts its retries, or times out
pub async fn execute_with_retry(
    workflow_id: &str,
    agent: Arc<dyn GovernanceAgent>,
    mut task: AgentTask,
    input: AgentInput,
    events: &EventBus,
) -> TaskOutcome {
    let agent_name = task.agent_name.clone();
    let mut attempts: u32 = 0;
    let mut retry_budget = task.retry_budget;

    events.publish(WorkflowEvent::AgentStarted {
        workflow_id: workflow_id.to_string(),
        agent_name: agent_name.clone(),
    });

    let attempt_loop = async {
        loop {
            attempts += 1;
            let started = Instant::now();
            let outcome = AssertUnwindSafe(agent.run(input.clone()))
                .catch_unwind()
                .await;
            let elapsed = started.elapsed().as_secs_f64();

            let error = match outcome {
                Ok(Ok(result)) if result.is_completed() => {
                    return result.with_execution_time(elapsed);
                }
                Ok(Ok(result)) => result
                    .error
                    .unwrap_or_else(|| "agent reported failure".to_string()),
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("agent panicked: {}", panic_message(panic.as_ref())),
            };

            if retry_budget == 0 {
                return AgentResult::failed(&agent_name, error).with_execution_time(elapsed);
            }

            retry_budget -= 1;
            warn!(
                workflow_id,
                agent = %agent_name,
                attempt = attempts,
                retries_left = retry_budget,
                "Agent attempt failed, retrying: {}",
                error
            );
            events.publish(WorkflowEvent::AgentRetrying {
                workflow_id: workflow_id.to_string(),
                agent_name: agent_name.clone(),
                attempt: attempts,
                error,
            });
        }
    };

    let result = match tokio::time::timeout(task.timeout(), attempt_loop).await {
        Ok(result) => result,
        Err(_) => AgentResult::failed(
            &agent_name,
            format!("timed out after {}s", task.timeout_seconds),
        ),
    };

    task.retry_budget = retry_budget;
    let result = result.with_attempts(attempts);

    match &result.error {
        None => {
            debug!(workflow_id, agent = %agent_name, attempts, "Agent completed");
            events.publish(WorkflowEvent::AgentCompleted {
                workflow_id: workflow_id.to_string(),
                agent_name: agent_name.clone(),
                attempts,
                execution_time: result.execution_time,
            });
        }
        Some(error) => {
            error!(workflow_id, agent = %agent_name, attempts, "Agent failed: {}", error);
            events.publish(WorkflowEvent::AgentFailed {
                workflow_id: workflow_id.to_string(),
                agent_name: agent_name.clone(),
                attempts,
                error: error.clone(),
            });
        }
    }

    TaskOutcome {
        task,
        result,
        attempts,
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
