use governance_sdk::WorkflowEvent;
use tokio::sync::broadcast;

/// Broadcast channel carrying progress events of every workflow
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: WorkflowEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
