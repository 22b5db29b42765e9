//! Execution planning: grouping tasks into dependency levels.
//!
//! A level holds tasks whose dependencies were all satisfied by earlier
//! levels, so the tasks of one level can run concurrently. Graphs with
//! cycles or dangling dependencies still produce a plan: everything left
//! over is placed in one final level and the plan is marked degraded.
//! `validate_dependencies` catches those graphs up front.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::{OrchestratorError, Result};
use crate::task::AgentTask;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlan {
    pub levels: Vec<Vec<AgentTask>>,

    /// Set when unresolvable dependencies forced tasks into a shared level
    pub degraded: bool,
}

impl ExecutionPlan {
    pub fn total_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn total_tasks(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Index of the level holding the given agent
    pub fn level_of(&self, agent_name: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level.iter().any(|t| t.agent_name == agent_name))
    }
}

/// Build execution levels from a task list
pub fn plan(tasks: &[AgentTask]) -> ExecutionPlan {
    let mut remaining: Vec<AgentTask> = tasks.to_vec();
    let mut satisfied: HashSet<String> = HashSet::new();
    let mut levels = Vec::new();
    let mut degraded = false;

    while !remaining.is_empty() {
        let (mut ready, blocked): (Vec<AgentTask>, Vec<AgentTask>) = remaining
            .into_iter()
            .partition(|task| task.depends_on.iter().all(|dep| satisfied.contains(dep)));

        if ready.is_empty() {
            let stuck: Vec<&str> = blocked.iter().map(|t| t.agent_name.as_str()).collect();
            warn!(
                agents = ?stuck,
                "Circular or unresolved dependencies, scheduling remaining tasks together"
            );
            degraded = true;
            ready = blocked;
            remaining = Vec::new();
        } else {
            remaining = blocked;
        }

        // Stable: equal priorities keep template order
        ready.sort_by_key(|task| task.priority);
        satisfied.extend(ready.iter().map(|task| task.agent_name.clone()));
        levels.push(ready);
    }

    debug!(levels = levels.len(), degraded, "Execution plan built");
    ExecutionPlan { levels, degraded }
}

/// Reject task lists that would only plan in degraded mode
pub fn validate_dependencies(tasks: &[AgentTask]) -> Result<()> {
    let mut names: HashSet<&str> = HashSet::new();
    for task in tasks {
        if !names.insert(task.agent_name.as_str()) {
            return Err(OrchestratorError::DuplicateAgent(task.agent_name.clone()));
        }
    }

    for task in tasks {
        for dep in &task.depends_on {
            if !names.contains(dep.as_str()) {
                return Err(OrchestratorError::UnsatisfiableDependency {
                    agent: task.agent_name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    match find_cycle(tasks) {
        Some(cycle) => Err(OrchestratorError::CyclicDependency(cycle)),
        None => Ok(()),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first search returning the first cycle found, closed on its start
fn find_cycle(tasks: &[AgentTask]) -> Option<Vec<String>> {
    let edges: HashMap<&str, &[String]> = tasks
        .iter()
        .map(|t| (t.agent_name.as_str(), t.depends_on.as_slice()))
        .collect();

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();

    for task in tasks {
        if let Some(cycle) = visit(task.agent_name.as_str(), &edges, &mut marks, &mut path) {
            return Some(cycle);
        }
    }
    None
}

fn visit<'a>(
    node: &'a str,
    edges: &HashMap<&'a str, &'a [String]>,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    match marks.get(node) {
        Some(Mark::Done) => return None,
        Some(Mark::Visiting) => {
            let start = path.iter().position(|n| *n == node)?;
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        None => {}
    }

    marks.insert(node, Mark::Visiting);
    path.push(node);

    if let Some(&deps) = edges.get(node) {
        for dep in deps {
            if let Some(cycle) = visit(dep.as_str(), edges, marks, path) {
                return Some(cycle);
            }
        }
    }

    path.pop();
    marks.insert(node, Mark::Done);
    None
}
