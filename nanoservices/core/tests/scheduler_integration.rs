use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sourcesense_core::config::types::WorkflowConfig;
use sourcesense_core::events::trigger::RunRequest;
use sourcesense_core::pipeline::{
    ExtractionActivities, FetchOutcome, PipelineSettings, Stage, TransformOutcome, Workflow,
};
use sourcesense_core::scheduler::runner::run_scheduler;
use sourcesense_core::services::object_store::{LocalObjectStore, ObjectStore};
use sourcesense_core::services::state_store::{InMemoryStateStore, StateStore};
use sourcesense_core::store::db::Store;
use sourcesense_utils::error::Error;
use sourcesense_utils::SourceSenseResult;
use tokio::sync::{mpsc, watch, Mutex};

/// Fetch takes `fetch_delay` and finds nothing.
struct SlowActivities {
    state: InMemoryStateStore,
    settings: PipelineSettings,
    fetch_delay: Duration,
}

#[async_trait]
impl ExtractionActivities for SlowActivities {
    fn state_store(&self) -> &dyn StateStore {
        &self.state
    }

    fn object_store(&self) -> Arc<dyn ObjectStore> {
        Arc::new(LocalObjectStore::new("/nonexistent/store", "/nonexistent/catalog"))
    }

    fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    async fn fetch(&self, config: &WorkflowConfig) -> SourceSenseResult<Option<FetchOutcome>> {
        if config.workflow_id == "wf-panics" {
            panic!("connector blew up");
        }
        tokio::time::sleep(self.fetch_delay).await;
        Ok(None)
    }

    async fn transform(&self, _: &WorkflowConfig, _: &FetchOutcome) -> SourceSenseResult<Option<TransformOutcome>> {
        Ok(None)
    }
}

async fn slow_activities(fetch_delay: Duration, settings: PipelineSettings) -> Arc<SlowActivities> {
    let state = InMemoryStateStore::new();
    for id in ["wf-a", "wf-b", "wf-c", "wf-panics"] {
        state.put(id, &WorkflowConfig::for_owner("octocat", "t")).await.unwrap();
    }
    state.put("wf-ownerless", &WorkflowConfig::for_owner("", "t")).await.unwrap();
    Arc::new(SlowActivities { state, settings, fetch_delay })
}

async fn wait_for_finished(store: &Arc<Mutex<Store>>, expected: usize) {
    for _ in 0..100 {
        let finished = store
            .lock()
            .await
            .recent_runs(50)
            .unwrap()
            .iter()
            .filter(|r| r.finished_at.is_some())
            .count();
        if finished >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("runs did not finish in time");
}

#[tokio::test]
async fn runs_proceed_concurrently_and_are_recorded() {
    sourcesense_core::logging::init();
    let acts = slow_activities(Duration::from_millis(300), PipelineSettings::default()).await;
    let store = Arc::new(Mutex::new(Store::in_memory().unwrap()));
    let (request_tx, request_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run_scheduler(request_rx, acts, store.clone(), shutdown_rx));

    let started = Instant::now();
    let requests: Vec<RunRequest> = ["wf-a", "wf-b", "wf-c"].into_iter().map(RunRequest::new).collect();
    for request in &requests {
        request_tx.send(request.clone()).await.unwrap();
    }
    wait_for_finished(&store, 3).await;
    assert!(
        started.elapsed() < Duration::from_millis(800),
        "runs were serialized: {:?}",
        started.elapsed()
    );

    shutdown_tx.send(true).unwrap();
    scheduler.await.unwrap();

    let store = store.lock().await;
    for request in &requests {
        let runs = store.runs_for_workflow(&request.workflow_id).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, "completed");
        assert_eq!(runs[0].outcome.as_deref(), Some("no_records"));
        assert_eq!(runs[0].trigger_type, "manual");

        let stages: Vec<String> = store
            .stage_runs_for(&request.run_id)
            .unwrap()
            .into_iter()
            .map(|s| s.stage)
            .collect();
        assert_eq!(stages, vec!["resolve_config", "preflight", "fetch"]);
    }
}

#[tokio::test]
async fn failed_run_records_the_failing_stage() {
    let acts = slow_activities(Duration::ZERO, PipelineSettings::default()).await;
    let store = Arc::new(Mutex::new(Store::in_memory().unwrap()));
    let (request_tx, request_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run_scheduler(request_rx, acts, store.clone(), shutdown_rx));

    let request = RunRequest::new("wf-ownerless");
    request_tx.send(request.clone()).await.unwrap();
    wait_for_finished(&store, 1).await;
    shutdown_tx.send(true).unwrap();
    scheduler.await.unwrap();

    let store = store.lock().await;
    let run = &store.runs_for_workflow("wf-ownerless").unwrap()[0];
    assert_eq!(run.status, "failed");
    assert_eq!(run.failed_stage.as_deref(), Some("preflight"));
    assert!(run.error.as_deref().unwrap().contains("owner"));

    let stages = store.stage_runs_for(&request.run_id).unwrap();
    assert_eq!(stages.len(), 2);
    assert_eq!(stages[1].status, "failed");
}

#[tokio::test]
async fn panicking_run_is_recorded_as_failed() {
    let acts = slow_activities(Duration::ZERO, PipelineSettings::default()).await;
    let store = Arc::new(Mutex::new(Store::in_memory().unwrap()));
    let (request_tx, request_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run_scheduler(request_rx, acts, store.clone(), shutdown_rx));

    request_tx.send(RunRequest::new("wf-panics")).await.unwrap();
    request_tx.send(RunRequest::new("wf-a")).await.unwrap();
    wait_for_finished(&store, 2).await;
    shutdown_tx.send(true).unwrap();
    scheduler.await.unwrap();

    let store = store.lock().await;
    let run = &store.runs_for_workflow("wf-panics").unwrap()[0];
    assert_eq!(run.status, "failed");
    assert_eq!(run.failed_stage.as_deref(), Some("fetch"));
    assert!(run.error.as_deref().unwrap().contains("connector blew up"));

    let healthy = &store.runs_for_workflow("wf-a").unwrap()[0];
    assert_eq!(healthy.status, "completed");
}

#[tokio::test]
async fn shutdown_cancels_runs_in_flight() {
    let acts = slow_activities(Duration::from_secs(30), PipelineSettings::default()).await;
    let store = Arc::new(Mutex::new(Store::in_memory().unwrap()));
    let (request_tx, request_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run_scheduler(request_rx, acts, store.clone(), shutdown_rx));

    request_tx.send(RunRequest::new("wf-a")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(true).unwrap();
    scheduler.await.unwrap();

    let store = store.lock().await;
    let run = &store.runs_for_workflow("wf-a").unwrap()[0];
    assert_eq!(run.status, "cancelled");
    assert!(run.finished_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn stage_exceeding_its_limit_times_out() {
    let mut settings = PipelineSettings::default();
    settings.timeouts.fetch = Duration::from_secs(5);
    let acts = slow_activities(Duration::from_secs(60), settings).await;

    let failure = Workflow::new(acts).run("wf-a", "run-1").await.unwrap_err();
    assert_eq!(failure.stage, Stage::Fetch);
    match failure.error {
        Error::Timeout { stage, seconds } => {
            assert_eq!(stage, "fetch");
            assert_eq!(seconds, 5);
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
}
