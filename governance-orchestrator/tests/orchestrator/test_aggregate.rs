//! Tests for result aggregation through complete workflow runs

use super::common::*;
use governance_orchestrator::aggregate::{aggregate, AggregatedAssessment};
use governance_sdk::{ComplianceStatus, GovernanceAgent, RiskLevel, WorkflowType};
use std::sync::Arc;

fn agent(name: &str, risk: RiskLevel, compliance: ComplianceStatus, confidence: f64) -> Arc<dyn GovernanceAgent> {
    Arc::new(ScriptedAgent::new(name, risk, compliance, confidence))
}

#[tokio::test]
async fn test_severity_tie_break_through_workflow() {
    let (orchestrator, _audit) = orchestrator_with_audit(config());
    register(
        &orchestrator,
        &[
            ("a", agent("a", RiskLevel::Low, ComplianceStatus::Compliant, 6.0)),
            ("b", agent("b", RiskLevel::High, ComplianceStatus::Compliant, 7.0)),
            ("c", agent("c", RiskLevel::Medium, ComplianceStatus::Compliant, 8.0)),
        ],
    );

    let custom = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let id = orchestrator
        .create_workflow(WorkflowType::ComprehensiveAssessment, system_context(), Some(custom.as_slice()))
        .unwrap();
    let result = orchestrator.execute_workflow(&id).await.unwrap();

    let AggregatedAssessment::Completed(summary) = &result.aggregated_assessment else {
        panic!("expected completed assessment");
    };
    assert_eq!(summary.overall_risk_level, RiskLevel::High);
    assert_eq!(summary.overall_compliance, ComplianceStatus::Compliant);
    assert_eq!(summary.confidence_score, 7.0);
    assert_eq!(summary.agents_consulted, vec!["a", "b", "c"]);
    assert!(summary.failed_agents.is_empty());
}

#[tokio::test]
async fn test_compliance_precedence_through_workflow() {
    let (orchestrator, _audit) = orchestrator_with_audit(config());
    register(
        &orchestrator,
        &[
            ("a", agent("a", RiskLevel::Low, ComplianceStatus::Compliant, 5.0)),
            ("b", agent("b", RiskLevel::Low, ComplianceStatus::NonCompliant, 5.0)),
            ("c", agent("c", RiskLevel::Low, ComplianceStatus::Partial, 5.0)),
        ],
    );

    let custom = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let id = orchestrator
        .create_workflow(WorkflowType::ComplianceCheck, system_context(), Some(custom.as_slice()))
        .unwrap();
    let result = orchestrator.execute_workflow(&id).await.unwrap();

    assert_eq!(
        result.aggregated_assessment.overall_compliance(),
        Some(ComplianceStatus::NonCompliant)
    );
}

#[tokio::test]
async fn test_aggregation_is_idempotent_over_stored_results() {
    let orchestrator = mock_orchestrator();
    let id = orchestrator
        .create_workflow(WorkflowType::ComprehensiveAssessment, system_context(), None)
        .unwrap();
    let result = orchestrator.execute_workflow(&id).await.unwrap();

    let recomputed = aggregate(&result.agent_results, result.workflow_type);
    assert_eq!(recomputed, result.aggregated_assessment);
    assert_eq!(aggregate(&result.agent_results, result.workflow_type), recomputed);
}

#[tokio::test]
async fn test_mock_pipeline_summary() {
    let orchestrator = mock_orchestrator();
    let id = orchestrator
        .create_workflow(WorkflowType::ComprehensiveAssessment, system_context(), None)
        .unwrap();
    let result = orchestrator.execute_workflow(&id).await.unwrap();

    let AggregatedAssessment::Completed(summary) = result.aggregated_assessment else {
        panic!("expected completed assessment");
    };
    assert_eq!(summary.overall_risk_level, RiskLevel::Medium);
    assert_eq!(summary.overall_compliance, ComplianceStatus::Partial);
    assert_eq!(summary.confidence_score, 6.0);
    assert_eq!(summary.total_recommendations, 5);
    assert_eq!(
        summary.assessment_summary,
        "Multi-agent assessment completed (5 agents). Risk distribution: 5 medium."
    );
    assert!(result.agent_results.values().all(|r| r.mock));
}
