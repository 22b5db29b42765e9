//! Tests for level execution and retries
//!
//! Tests result completeness, dependency inputs, retry bounds and timeouts

use super::common::*;
use governance_orchestrator::agents::AgentRegistry;
use governance_orchestrator::events::EventBus;
use governance_orchestrator::executor::LevelExecutor;
use governance_orchestrator::planner::plan;
use governance_orchestrator::task::{template, AgentTask};
use governance_orchestrator::OrchestratorConfig;
use governance_sdk::{GovernanceAgent, Priority, WorkflowType};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

fn executor(workers: usize) -> LevelExecutor {
    LevelExecutor::new(Arc::new(Semaphore::new(workers)), EventBus::new(100))
}

fn registry(agents: &[(&str, Arc<dyn GovernanceAgent>)]) -> AgentRegistry {
    agents
        .iter()
        .map(|(name, agent)| (name.to_string(), Arc::clone(agent)))
        .collect()
}

// ============================================================================
// Result Completeness Tests
// ============================================================================

#[tokio::test]
async fn test_every_planned_task_gets_a_result() {
    let tasks = template(WorkflowType::ComprehensiveAssessment);
    let plan = plan(&tasks);
    // bias_agent and audit_agent are missing from the registry
    let agents = registry(&[
        ("risk_agent", Arc::new(ScriptedAgent::ok("risk_agent"))),
        ("policy_agent", Arc::new(ScriptedAgent::ok("policy_agent"))),
        (
            "liability_protection_agent",
            Arc::new(ScriptedAgent::failing("liability_protection_agent")),
        ),
    ]);

    let mut seen = Vec::new();
    let results = executor(5)
        .execute("workflow_1_00000000", &plan, &agents, &system_context(), |outcome| {
            seen.push(outcome.task.agent_name.clone())
        })
        .await;

    assert_eq!(results.len(), tasks.len());
    assert_eq!(seen.len(), tasks.len());
    assert!(results["risk_agent"].is_completed());
    assert_eq!(
        results["bias_agent"].error.as_deref(),
        Some("agent 'bias_agent' is not registered")
    );
    assert!(!results["liability_protection_agent"].is_completed());
}

// ============================================================================
// Dependency Input Tests
// ============================================================================

#[tokio::test]
async fn test_previous_results_restricted_to_dependencies() {
    let risk = Arc::new(ScriptedAgent::ok("risk_agent"));
    let bias = Arc::new(ScriptedAgent::ok("bias_agent"));
    let policy = Arc::new(ScriptedAgent::ok("policy_agent"));
    let audit = Arc::new(ScriptedAgent::ok("audit_agent"));
    let liability = Arc::new(ScriptedAgent::ok("liability_protection_agent"));

    let agents = registry(&[
        ("risk_agent", risk.clone()),
        ("bias_agent", bias.clone()),
        ("policy_agent", policy.clone()),
        ("audit_agent", audit.clone()),
        ("liability_protection_agent", liability.clone()),
    ]);

    let plan = plan(&template(WorkflowType::ComprehensiveAssessment));
    executor(5)
        .execute("workflow_1_00000000", &plan, &agents, &system_context(), |_| {})
        .await;

    let risk_input = &risk.inputs()[0];
    assert!(risk_input.previous_results.is_empty());
    assert_eq!(risk_input.context_str("system_name"), Some("Resume screener"));

    let bias_input = &bias.inputs()[0];
    assert_eq!(
        bias_input.previous_results.keys().collect::<Vec<_>>(),
        vec!["risk_agent"]
    );

    let audit_input = &audit.inputs()[0];
    assert_eq!(
        audit_input.previous_results.keys().collect::<Vec<_>>(),
        vec!["bias_agent", "policy_agent", "risk_agent"]
    );

    let liability_input = &liability.inputs()[0];
    assert_eq!(
        liability_input.previous_results.keys().collect::<Vec<_>>(),
        vec!["audit_agent"]
    );
}

#[tokio::test]
async fn test_unregistered_upstream_failure_is_visible() {
    let bias = Arc::new(ScriptedAgent::ok("bias_agent"));
    let agents = registry(&[("bias_agent", bias.clone())]);

    let tasks = vec![
        AgentTask::new("risk_agent", Priority::Critical),
        AgentTask::new("bias_agent", Priority::High).depends_on(["risk_agent"]),
    ];
    executor(5)
        .execute("workflow_1_00000000", &plan(&tasks), &agents, &system_context(), |_| {})
        .await;

    // risk_agent failed as unregistered; its failure is still visible downstream
    let input = &bias.inputs()[0];
    assert!(!input.previous("risk_agent").unwrap().is_completed());
}

#[tokio::test]
async fn test_task_input_overrides_shared_context() {
    let agent = Arc::new(ScriptedAgent::ok("risk_agent"));
    let agents = registry(&[("risk_agent", agent.clone())]);

    let mut input = serde_json::Map::new();
    input.insert("system_name".to_string(), serde_json::json!("Override"));
    let tasks = vec![AgentTask::new("risk_agent", Priority::Critical).with_input(input)];

    executor(1)
        .execute("workflow_1_00000000", &plan(&tasks), &agents, &system_context(), |_| {})
        .await;

    let received = &agent.inputs()[0];
    assert_eq!(received.context_str("system_name"), Some("Override"));
    assert_eq!(received.context_str("domain"), Some("hiring"));
}

// ============================================================================
// Retry Tests
// ============================================================================

#[tokio::test]
async fn test_retry_bound_is_budget_plus_one() {
    for budget in [0, 1, 2, 4] {
        let agent = Arc::new(ScriptedAgent::failing("risk_agent"));
        let agents = registry(&[("risk_agent", agent.clone())]);
        let tasks = vec![AgentTask::new("risk_agent", Priority::Critical).with_retry_budget(budget)];

        let mut outcomes = Vec::new();
        let results = executor(1)
            .execute("workflow_1_00000000", &plan(&tasks), &agents, &system_context(), |o| {
                outcomes.push(o.clone())
            })
            .await;

        assert_eq!(agent.calls(), budget + 1, "budget {}", budget);
        assert_eq!(outcomes[0].attempts, budget + 1);
        assert_eq!(outcomes[0].task.retry_budget, 0);
        assert_eq!(results["risk_agent"].attempts, budget + 1);
        assert!(results["risk_agent"]
            .error
            .as_deref()
            .unwrap()
            .contains(&format!("call {}", budget + 1)));
    }
}

#[tokio::test]
async fn test_recovered_agent_keeps_remaining_budget() {
    let agent = Arc::new(ScriptedAgent::ok("bias_agent").fail_first(1).reporting_failure());
    let agents = registry(&[("bias_agent", agent.clone())]);
    let tasks = vec![AgentTask::new("bias_agent", Priority::High).with_retry_budget(2)];

    let mut outcomes = Vec::new();
    let results = executor(1)
        .execute("workflow_1_00000000", &plan(&tasks), &agents, &system_context(), |o| {
            outcomes.push(o.clone())
        })
        .await;

    assert!(results["bias_agent"].is_completed());
    assert_eq!(agent.calls(), 2);
    assert_eq!(outcomes[0].task.retry_budget, 1);
    assert_eq!(results["bias_agent"].attempts, 2);
}

// ============================================================================
// Concurrency and Timeout Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_level_runs_concurrently() {
    let delay = Duration::from_secs(10);
    let agents = registry(&[
        ("a", Arc::new(ScriptedAgent::ok("a").with_delay(delay))),
        ("b", Arc::new(ScriptedAgent::ok("b").with_delay(delay))),
        ("c", Arc::new(ScriptedAgent::ok("c").with_delay(delay))),
    ]);
    let tasks = vec![
        AgentTask::new("a", Priority::High),
        AgentTask::new("b", Priority::High),
        AgentTask::new("c", Priority::High),
    ];

    let started = tokio::time::Instant::now();
    let results = executor(5)
        .execute("workflow_1_00000000", &plan(&tasks), &agents, &system_context(), |_| {})
        .await;

    assert!(results.values().all(|r| r.is_completed()));
    assert!(started.elapsed() < Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn test_worker_pool_serializes_when_exhausted() {
    let delay = Duration::from_secs(10);
    let agents = registry(&[
        ("a", Arc::new(ScriptedAgent::ok("a").with_delay(delay))),
        ("b", Arc::new(ScriptedAgent::ok("b").with_delay(delay))),
    ]);
    let tasks = vec![
        AgentTask::new("a", Priority::High).with_timeout(60),
        AgentTask::new("b", Priority::High).with_timeout(60),
    ];

    let started = tokio::time::Instant::now();
    let results = executor(1)
        .execute("workflow_1_00000000", &plan(&tasks), &agents, &system_context(), |_| {})
        .await;

    assert!(results.values().all(|r| r.is_completed()));
    assert!(started.elapsed() >= Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn test_slow_agent_times_out() {
    let config = OrchestratorConfig {
        default_timeout_secs: 1,
        default_retry_budget: 0,
        ..OrchestratorConfig::default()
    };
    let (orchestrator, _audit) = orchestrator_with_audit(config);
    register(
        &orchestrator,
        &[(
            "risk_agent",
            Arc::new(ScriptedAgent::ok("risk_agent").with_delay(Duration::from_secs(30))),
        )],
    );

    let id = orchestrator
        .create_workflow(WorkflowType::RapidScreening, system_context(), None)
        .unwrap();
    let result = orchestrator.execute_workflow(&id).await.unwrap();

    let risk = &result.agent_results["risk_agent"];
    assert!(!risk.is_completed());
    assert_eq!(risk.error.as_deref(), Some("timed out after 1s"));
    assert!(!result.aggregated_assessment.is_completed());
}
