use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use crate::events::trigger::{RunRequest, Trigger};

/// Spawns a tokio task that requests a run of `workflow_id` on a fixed interval.
/// Returns a JoinHandle that can be aborted to stop the timer.
pub fn spawn_interval_trigger(
    workflow_id: String,
    interval: Duration,
    sender: mpsc::Sender<RunRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the first immediate tick
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let request = RunRequest::with_trigger(workflow_id.clone(), Trigger::Interval(interval));
            if sender.send(request).await.is_err() {
                break;
            }
        }
    })
}
