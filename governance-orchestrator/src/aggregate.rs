//! Combining per-agent results into one assessment.

use governance_sdk::{AgentResult, ComplianceStatus, RiskLevel, WorkflowType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const NO_SUCCESSFUL_AGENTS: &str = "No agents completed successfully";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "overall_status", rename_all = "snake_case")]
pub enum AggregatedAssessment {
    Completed(AssessmentSummary),
    Failed {
        message: String,
        failed_agents: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    pub overall_risk_level: RiskLevel,
    pub overall_compliance: ComplianceStatus,
    pub confidence_score: f64,
    pub recommendations: Vec<String>,
    pub total_recommendations: usize,
    pub agents_consulted: Vec<String>,
    pub failed_agents: Vec<String>,
    pub workflow_type: WorkflowType,
    pub assessment_summary: String,
}

impl AggregatedAssessment {
    pub fn is_completed(&self) -> bool {
        matches!(self, AggregatedAssessment::Completed(_))
    }

    pub fn overall_risk_level(&self) -> Option<RiskLevel> {
        match self {
            AggregatedAssessment::Completed(summary) => Some(summary.overall_risk_level),
            AggregatedAssessment::Failed { .. } => None,
        }
    }

    pub fn overall_compliance(&self) -> Option<ComplianceStatus> {
        match self {
            AggregatedAssessment::Completed(summary) => Some(summary.overall_compliance),
            AggregatedAssessment::Failed { .. } => None,
        }
    }

    pub fn failed_agents(&self) -> &[String] {
        match self {
            AggregatedAssessment::Completed(summary) => &summary.failed_agents,
            AggregatedAssessment::Failed { failed_agents, .. } => failed_agents,
        }
    }
}

/// Aggregate agent results
///
/// Pure: the same results always produce the same assessment.
pub fn aggregate(
    results: &BTreeMap<String, AgentResult>,
    workflow_type: WorkflowType,
) -> AggregatedAssessment {
    let (successful, failed): (Vec<_>, Vec<_>) =
        results.iter().partition(|(_, result)| result.is_completed());

    let failed_agents: Vec<String> = failed.iter().map(|(name, _)| (*name).clone()).collect();

    if successful.is_empty() {
        return AggregatedAssessment::Failed {
            message: NO_SUCCESSFUL_AGENTS.to_string(),
            failed_agents,
        };
    }

    let mut risk_levels = Vec::new();
    let mut confidence_scores = Vec::new();
    let mut compliance_statuses = Vec::new();
    let mut recommendations = Vec::new();
    let mut seen = HashSet::new();

    for (_, result) in &successful {
        let Some(data) = &result.assessment_data else {
            continue;
        };
        risk_levels.extend(data.risk_level);
        confidence_scores.extend(data.confidence_score);
        compliance_statuses.extend(data.compliance_status);
        for recommendation in &data.recommendations {
            if seen.insert(recommendation.as_str()) {
                recommendations.push(recommendation.clone());
            }
        }
    }

    let overall_risk_level = risk_levels
        .iter()
        .copied()
        .max_by_key(|level| level.severity())
        .unwrap_or_default();

    let confidence_score = if confidence_scores.is_empty() {
        0.0
    } else {
        let mean = confidence_scores.iter().sum::<f64>() / confidence_scores.len() as f64;
        (mean * 100.0).round() / 100.0
    };

    AggregatedAssessment::Completed(AssessmentSummary {
        overall_risk_level,
        overall_compliance: overall_compliance(&compliance_statuses),
        confidence_score,
        total_recommendations: recommendations.len(),
        recommendations,
        agents_consulted: successful.iter().map(|(name, _)| (*name).clone()).collect(),
        failed_agents,
        workflow_type,
        assessment_summary: summarize(successful.len(), &risk_levels),
    })
}

fn overall_compliance(statuses: &[ComplianceStatus]) -> ComplianceStatus {
    if statuses.is_empty() {
        ComplianceStatus::Unknown
    } else if statuses.contains(&ComplianceStatus::NonCompliant) {
        ComplianceStatus::NonCompliant
    } else if statuses.contains(&ComplianceStatus::Partial) {
        ComplianceStatus::Partial
    } else if statuses.iter().all(|s| *s == ComplianceStatus::Compliant) {
        ComplianceStatus::Compliant
    } else {
        ComplianceStatus::Unknown
    }
}

/// Human-readable risk distribution, most severe level first
fn summarize(agent_count: usize, risk_levels: &[RiskLevel]) -> String {
    if risk_levels.is_empty() {
        return format!(
            "Assessment completed with {} agents. Detailed analysis required.",
            agent_count
        );
    }

    let distribution: Vec<String> = RiskLevel::ALL
        .iter()
        .rev()
        .filter_map(|level| {
            let count = risk_levels.iter().filter(|l| *l == level).count();
            (count > 0).then(|| format!("{} {}", count, level))
        })
        .collect();

    format!(
        "Multi-agent assessment completed ({} agents). Risk distribution: {}.",
        agent_count,
        distribution.join(", ")
    )
}
