//! Tests for the workflow lifecycle
//!
//! Tests state transitions, status reports, cancellation, progress events and
//! the failure path taken on storage faults

use super::common::*;
use governance_orchestrator::{Orchestrator, OrchestratorError, WorkflowStatusReport};
use governance_sdk::{GovernanceAgent, WorkflowEvent, WorkflowStatus, WorkflowType};
use std::sync::Arc;
use tokio::sync::broadcast;

fn drain(rx: &mut broadcast::Receiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ============================================================================
// State Machine Tests
// ============================================================================

#[tokio::test]
async fn test_created_to_completed() {
    let orchestrator = mock_orchestrator();
    let id = orchestrator
        .create_workflow(WorkflowType::BiasAudit, system_context(), None)
        .unwrap();

    match orchestrator.get_workflow_status(&id).unwrap().unwrap() {
        WorkflowStatusReport::Active {
            status, progress, ..
        } => {
            assert_eq!(status, WorkflowStatus::Created);
            assert_eq!(progress.total_tasks, 2);
            assert_eq!(progress.completed_tasks, 0);
        }
        other => panic!("expected active workflow, got {:?}", other),
    }

    let result = orchestrator.execute_workflow(&id).await.unwrap();
    assert_eq!(result.status, WorkflowStatus::Completed);
    assert!(result.end_time >= result.start_time);
    assert_eq!(result.execution_metadata.total_agents, 2);
    assert_eq!(
        result.execution_metadata.agents_executed,
        vec!["audit_agent", "bias_agent"]
    );

    match orchestrator.get_workflow_status(&id).unwrap().unwrap() {
        WorkflowStatusReport::Finished {
            status,
            completed_at,
            execution_time,
            ..
        } => {
            assert_eq!(status, WorkflowStatus::Completed);
            assert!(completed_at.is_some());
            assert_eq!(execution_time, Some(result.execution_metadata.execution_time_seconds));
        }
        other => panic!("expected finished workflow, got {:?}", other),
    }
}

#[tokio::test]
async fn test_execute_unknown_workflow() {
    let orchestrator = mock_orchestrator();
    let err = orchestrator
        .execute_workflow("workflow_0_deadbeef")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(ref id) if id == "workflow_0_deadbeef"));
    assert!(orchestrator
        .get_workflow_status("workflow_0_deadbeef")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_execute_twice_is_rejected() {
    let orchestrator = mock_orchestrator();
    let id = orchestrator
        .create_workflow(WorkflowType::RapidScreening, system_context(), None)
        .unwrap();
    orchestrator.execute_workflow(&id).await.unwrap();

    let err = orchestrator.execute_workflow(&id).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::InvalidTransition {
            from: WorkflowStatus::Completed,
            to: WorkflowStatus::Running,
            ..
        }
    ));
}

#[tokio::test]
async fn test_concurrent_execute_runs_once() {
    let orchestrator = Arc::new(Orchestrator::with_defaults());
    let risk = Arc::new(ScriptedAgent::ok("risk_agent").with_delay(std::time::Duration::from_millis(20)));
    register(&orchestrator, &[("risk_agent", risk.clone() as Arc<dyn GovernanceAgent>)]);

    let id = orchestrator
        .create_workflow(WorkflowType::RapidScreening, system_context(), None)
        .unwrap();

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        let id = id.clone();
        tokio::spawn(async move { orchestrator.execute_workflow(&id).await })
    };
    let second = {
        let orchestrator = Arc::clone(&orchestrator);
        let id = id.clone();
        tokio::spawn(async move { orchestrator.execute_workflow(&id).await })
    };

    let outcomes = [first.await.unwrap(), second.await.unwrap()];
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|o| matches!(
        o,
        Err(OrchestratorError::InvalidTransition { .. })
    )));
    assert_eq!(risk.calls(), 1);
}

// ============================================================================
// Cancellation Tests
// ============================================================================

#[tokio::test]
async fn test_cancelled_workflow_moves_to_history() {
    let orchestrator = mock_orchestrator();
    let mut rx = orchestrator.subscribe();
    let id = orchestrator
        .create_workflow(WorkflowType::RiskFocused, system_context(), None)
        .unwrap();

    assert!(orchestrator.cancel_workflow(&id).unwrap());

    let stats = orchestrator.stats().unwrap();
    assert_eq!(stats.active_workflows, 0);
    assert_eq!(stats.completed_workflows, 1);
    assert_eq!(
        orchestrator.get_workflow_status(&id).unwrap().unwrap().status(),
        WorkflowStatus::Cancelled
    );
    assert!(orchestrator.workflow_result(&id).unwrap().is_none());
    assert_eq!(
        drain(&mut rx),
        vec![WorkflowEvent::WorkflowCancelled { workflow_id: id.clone() }]
    );
}

#[tokio::test]
async fn test_completed_workflow_cannot_be_cancelled() {
    let orchestrator = mock_orchestrator();
    let id = orchestrator
        .create_workflow(WorkflowType::RapidScreening, system_context(), None)
        .unwrap();
    orchestrator.execute_workflow(&id).await.unwrap();

    assert!(!orchestrator.cancel_workflow(&id).unwrap());
    assert_eq!(
        orchestrator.get_workflow_status(&id).unwrap().unwrap().status(),
        WorkflowStatus::Completed
    );
}

// ============================================================================
// Event Stream Tests
// ============================================================================

#[tokio::test]
async fn test_event_order_for_comprehensive_run() {
    let orchestrator = mock_orchestrator();
    let mut rx = orchestrator.subscribe();
    let id = orchestrator
        .create_workflow(WorkflowType::ComprehensiveAssessment, system_context(), None)
        .unwrap();
    orchestrator.execute_workflow(&id).await.unwrap();

    let events = drain(&mut rx);
    assert!(events.iter().all(|e| e.workflow_id() == id));

    assert!(matches!(
        events.first(),
        Some(WorkflowEvent::WorkflowStarted { total_tasks: 5, .. })
    ));
    assert!(matches!(events.last(), Some(WorkflowEvent::WorkflowCompleted { .. })));

    let levels: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::LevelStarted {
                level, total_levels, ..
            } => Some((*level, *total_levels)),
            _ => None,
        })
        .collect();
    assert_eq!(levels, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);

    let completed = events
        .iter()
        .filter(|e| matches!(e, WorkflowEvent::AgentCompleted { attempts: 1, .. }))
        .count();
    assert_eq!(completed, 5);
}

#[tokio::test]
async fn test_retry_events() {
    let (orchestrator, _audit) = orchestrator_with_audit(config());
    register(
        &orchestrator,
        &[("risk_agent", Arc::new(ScriptedAgent::ok("risk_agent").fail_first(2)))],
    );
    let mut rx = orchestrator.subscribe();

    let id = orchestrator
        .create_workflow(WorkflowType::RapidScreening, system_context(), None)
        .unwrap();
    let result = orchestrator.execute_workflow(&id).await.unwrap();
    assert_eq!(result.agent_results["risk_agent"].attempts, 3);

    let retries: Vec<u32> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            WorkflowEvent::AgentRetrying { attempt, .. } => Some(attempt),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![1, 2]);
}

// ============================================================================
// Failure Path Tests
// ============================================================================

#[tokio::test]
async fn test_storage_fault_fails_workflow() {
    let audit = Arc::new(governance_orchestrator::InMemoryAuditSink::new());
    let orchestrator = Orchestrator::new(
        config(),
        Arc::new(RejectingHistoryStore::default()),
        audit.clone(),
    );
    register(
        &orchestrator,
        &[("risk_agent", Arc::new(ScriptedAgent::ok("risk_agent")))],
    );
    let mut rx = orchestrator.subscribe();

    let id = orchestrator
        .create_workflow(WorkflowType::RapidScreening, system_context(), None)
        .unwrap();
    let err = orchestrator.execute_workflow(&id).await.unwrap_err();
    assert_eq!(err.to_string(), "history storage full");

    let status = orchestrator.get_workflow_status(&id).unwrap().unwrap();
    assert_eq!(status.status(), WorkflowStatus::Failed);

    let events = audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action.as_str(), "workflow_failed");
    assert_eq!(events[0].details.error.as_deref(), Some("history storage full"));
    assert_eq!(events[0].details.agents_used, vec!["risk_agent"]);

    assert!(matches!(
        drain(&mut rx).last(),
        Some(WorkflowEvent::WorkflowFailed { .. })
    ));
}
