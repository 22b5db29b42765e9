use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::workflow::{HistoryEntry, Workflow};

/// Storage for active workflows and the history of finished ones
pub trait WorkflowStore: Send + Sync {
    fn insert(&self, workflow: Workflow) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<Workflow>>;

    /// Apply `f` to the stored workflow; returns `false` when it is not active
    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Workflow)) -> Result<bool>;

    fn remove(&self, id: &str) -> Result<Option<Workflow>>;

    fn push_history(&self, entry: HistoryEntry) -> Result<()>;

    fn history(&self) -> Result<Vec<HistoryEntry>>;

    fn find_history(&self, id: &str) -> Result<Option<HistoryEntry>>;

    fn active_count(&self) -> Result<usize>;

    fn history_count(&self) -> Result<usize>;
}

/// Mutex-guarded maps, lost on restart
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    active: Mutex<HashMap<String, Workflow>>,
    history: Mutex<Vec<HistoryEntry>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn active(&self) -> Result<MutexGuard<'_, HashMap<String, Workflow>>> {
        self.active
            .lock()
            .map_err(|_| anyhow!("Active workflow store lock poisoned"))
    }

    fn finished(&self) -> Result<MutexGuard<'_, Vec<HistoryEntry>>> {
        self.history
            .lock()
            .map_err(|_| anyhow!("Workflow history lock poisoned"))
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn insert(&self, workflow: Workflow) -> Result<()> {
        self.active()?.insert(workflow.id.clone(), workflow);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Workflow>> {
        Ok(self.active()?.get(id).cloned())
    }

    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Workflow)) -> Result<bool> {
        let mut active = self.active()?;
        match active.get_mut(id) {
            Some(workflow) => {
                f(workflow);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, id: &str) -> Result<Option<Workflow>> {
        Ok(self.active()?.remove(id))
    }

    fn push_history(&self, entry: HistoryEntry) -> Result<()> {
        self.finished()?.push(entry);
        Ok(())
    }

    fn history(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.finished()?.clone())
    }

    fn find_history(&self, id: &str) -> Result<Option<HistoryEntry>> {
        Ok(self
            .finished()?
            .iter()
            .rev()
            .find(|entry| entry.workflow.id == id)
            .cloned())
    }

    fn active_count(&self) -> Result<usize> {
        Ok(self.active()?.len())
    }

    fn history_count(&self) -> Result<usize> {
        Ok(self.finished()?.len())
    }
}
