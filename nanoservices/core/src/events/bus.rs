use tokio::sync::mpsc;
use crate::events::trigger::RunRequest;

/// Channel-based bus delivering run requests to the scheduler.
pub struct EventBus {
    sender: mpsc::Sender<RunRequest>,
    receiver: mpsc::Receiver<RunRequest>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self { sender, receiver }
    }

    /// Get a sender handle that can be cloned and given to trigger producers.
    pub fn sender(&self) -> mpsc::Sender<RunRequest> {
        self.sender.clone()
    }

    /// Receive the next request. Returns None when all senders are dropped.
    pub async fn recv(&mut self) -> Option<RunRequest> {
        self.receiver.recv().await
    }

    /// Split into sender and receiver (consumes self).
    pub fn split(self) -> (mpsc::Sender<RunRequest>, mpsc::Receiver<RunRequest>) {
        (self.sender, self.receiver)
    }
}
