use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sourcesense_utils::error::Error;
use sourcesense_utils::SourceSenseResult;
use tokio::sync::{mpsc, watch, Mutex};

use crate::builder::{BuildError, WorkflowBuilder};
use crate::config::types::AppConfig;
use crate::events::bus::EventBus;
use crate::events::interval::spawn_interval_trigger;
use crate::events::trigger::RunRequest;
use crate::pipeline::ExtractionActivities;
use crate::scheduler::runner;
use crate::store::db::Store;

/// Top-level service. Accepts run requests, schedules recurring runs and
/// keeps the run history until shut down.
pub struct SourceSense {
    activities: Arc<dyn ExtractionActivities>,
    schedules: Vec<(String, Duration)>,
    db_path: Option<String>,
    bus: EventBus,
}

impl SourceSense {
    pub fn new(activities: Arc<dyn ExtractionActivities>) -> Self {
        Self {
            activities,
            schedules: Vec::new(),
            db_path: None,
            bus: EventBus::new(256),
        }
    }

    /// Build the service and its collaborators from the application config.
    pub fn from_config(config: &AppConfig) -> Result<Self, BuildError> {
        let activities = WorkflowBuilder::from_config(config)?.build()?;
        let mut service = Self::new(Arc::new(activities));
        service.db_path = config.store.db_path.clone();
        Ok(service)
    }

    /// Set the path for the SQLite run history. Defaults to in-memory.
    pub fn db_path(mut self, path: impl Into<String>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// Request a run of `workflow_id` every `interval`.
    pub fn schedule(mut self, workflow_id: impl Into<String>, interval: Duration) -> Self {
        self.schedules.push((workflow_id.into(), interval));
        self
    }

    /// Handle for submitting runs while the service is running.
    pub fn submitter(&self) -> mpsc::Sender<RunRequest> {
        self.bus.sender()
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> SourceSenseResult<()> {
        let shutdown = tokio::signal::ctrl_c();
        self.run_with_shutdown(async {
            let _ = shutdown.await;
        })
        .await
    }

    /// Run until `shutdown` resolves. Runs still in flight are cancelled.
    pub async fn run_with_shutdown<F: Future>(self, shutdown: F) -> SourceSenseResult<()> {
        let store = match &self.db_path {
            Some(path) => Store::open(path),
            None => Store::in_memory(),
        }
        .map_err(|e| Error::Configuration(format!("failed to open run history: {e}")))?;

        match store.mark_inflight_as_crashed() {
            Ok(0) => {}
            Ok(count) => tracing::warn!(count, "marked in-flight runs as crashed from previous session"),
            Err(e) => tracing::warn!(error = %e, "failed to recover in-flight runs"),
        }
        let store = Arc::new(Mutex::new(store));

        let (request_tx, request_rx) = self.bus.split();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let trigger_handles: Vec<_> = self
            .schedules
            .into_iter()
            .map(|(workflow_id, interval)| {
                tracing::info!(workflow_id = %workflow_id, ?interval, "scheduling recurring runs");
                spawn_interval_trigger(workflow_id, interval, request_tx.clone())
            })
            .collect();
        drop(request_tx);

        let scheduler_handle = tokio::spawn(runner::run_scheduler(
            request_rx,
            self.activities,
            store,
            shutdown_rx,
        ));

        shutdown.await;
        let _ = shutdown_tx.send(true);
        for handle in trigger_handles {
            handle.abort();
        }
        if let Err(e) = scheduler_handle.await {
            tracing::error!(error = %e, "scheduler task failed");
        }

        tracing::info!("sourcesense shutdown complete");
        Ok(())
    }
}
