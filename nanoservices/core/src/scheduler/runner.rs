use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{Id, JoinError, JoinSet};
use uuid::Uuid;

use crate::events::trigger::RunRequest;
use crate::metrics;
use crate::pipeline::workflow::now;
use crate::pipeline::{ExtractionActivities, RunOutcome, StageFailure, Workflow, WorkflowEvent};
use crate::scheduler::state::{RunState, RunStatus};
use crate::store::db::{RunCompletion, StageRunRow, Store};

/// Result of one run, sent back to the scheduler when its task ends.
struct RunFinished {
    run_id: String,
    result: Result<RunOutcome, StageFailure>,
}

/// The scheduler loop. Receives run requests and drives each run on its own task.
///
/// Runs proceed concurrently; the loop itself owns the run states and is the
/// only writer of run history.
pub async fn run_scheduler(
    mut request_rx: mpsc::Receiver<RunRequest>,
    activities: Arc<dyn ExtractionActivities>,
    store: Arc<Mutex<Store>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let (event_tx, mut event_rx) = mpsc::channel::<WorkflowEvent>(256);
    let mut active_runs: HashMap<String, RunState> = HashMap::new();
    let mut runs: JoinSet<RunFinished> = JoinSet::new();
    let mut task_runs: HashMap<Id, String> = HashMap::new();

    loop {
        tokio::select! {
            Some(request) = request_rx.recv() => {
                if active_runs.contains_key(&request.run_id) {
                    tracing::warn!(run = %request.run_id, "ignoring duplicate run request");
                    continue;
                }

                {
                    let store = store.lock().await;
                    if let Err(e) = store.insert_workflow_run(
                        &request.run_id, &request.workflow_id, request.trigger.kind(), &now(),
                    ) {
                        tracing::warn!(run = %request.run_id, error = %e, "failed to persist run start");
                    }
                }

                active_runs.insert(
                    request.run_id.clone(),
                    RunState::new(request.run_id.clone(), request.workflow_id.clone()),
                );

                let workflow = Workflow::new(activities.clone()).with_events(event_tx.clone());
                let run_id = request.run_id.clone();
                let handle = runs.spawn(async move {
                    let result = workflow.run(&request.workflow_id, &request.run_id).await;
                    RunFinished { run_id: request.run_id, result }
                });
                task_runs.insert(handle.id(), run_id);
            }

            Some(event) = event_rx.recv() => {
                apply_event(event, &mut active_runs, &store).await;
            }

            Some(joined) = runs.join_next_with_id() => {
                // Stage events of this run may still be queued behind the join.
                while let Ok(event) = event_rx.try_recv() {
                    apply_event(event, &mut active_runs, &store).await;
                }
                match joined {
                    Ok((id, finished)) => {
                        task_runs.remove(&id);
                        finish_run(finished, &mut active_runs, &store).await;
                    }
                    Err(e) => {
                        let Some(run_id) = task_runs.remove(&e.id()) else {
                            tracing::error!(error = %e, "unknown run task ended abnormally");
                            continue;
                        };
                        let message = abnormal_exit_message(e);
                        tracing::error!(run = %run_id, error = %message, "run task ended abnormally");
                        abandon_run(&run_id, message, &mut active_runs, &store).await;
                    }
                }
            }

            _ = shutdown_rx.changed() => {
                tracing::info!(in_flight = active_runs.len(), "scheduler shutting down");
                runs.abort_all();
                let store = store.lock().await;
                let finished_at = now();
                for run_id in active_runs.keys() {
                    let completion = RunCompletion {
                        status: "cancelled",
                        finished_at: &finished_at,
                        ..Default::default()
                    };
                    if let Err(e) = store.complete_workflow_run(run_id, &completion) {
                        tracing::warn!(run = %run_id, error = %e, "failed to persist cancellation");
                    }
                }
                break;
            }
        }
    }
}

async fn apply_event(
    event: WorkflowEvent,
    active_runs: &mut HashMap<String, RunState>,
    store: &Arc<Mutex<Store>>,
) {
    match event {
        WorkflowEvent::StageStarted { run_id, stage, .. } => {
            if let Some(state) = active_runs.get_mut(&run_id) {
                state.stage_started(stage);
            }
        }
        WorkflowEvent::StageFinished { run_id, stage, started_at, finished_at, duration_ms, error } => {
            if let Some(state) = active_runs.get_mut(&run_id) {
                match &error {
                    Some(message) => state.stage_failed(stage, message.clone()),
                    None => state.stage_completed(stage),
                }
            }
            let row = StageRunRow {
                id: Uuid::new_v4().to_string(),
                run_id,
                stage: stage.name().to_string(),
                status: if error.is_some() { "failed" } else { "completed" }.to_string(),
                started_at,
                finished_at: Some(finished_at),
                duration_ms: Some(duration_ms as i64),
                error,
            };
            let store = store.lock().await;
            if let Err(e) = store.insert_stage_run(&row) {
                tracing::warn!(run = %row.run_id, stage = %row.stage, error = %e, "failed to persist stage run");
            }
        }
        WorkflowEvent::ShortCircuited { run_id, after } => {
            tracing::debug!(run = %run_id, after = %after, "run short-circuited");
            if let Some(state) = active_runs.get_mut(&run_id) {
                state.short_circuit();
            }
        }
    }
}

async fn finish_run(
    finished: RunFinished,
    active_runs: &mut HashMap<String, RunState>,
    store: &Arc<Mutex<Store>>,
) {
    let Some(mut state) = active_runs.remove(&finished.run_id) else {
        return;
    };
    let duration = state.started_at.elapsed().as_millis() as i64;
    let finished_at = now();

    let (outcome, failed_stage, error) = match &finished.result {
        Ok(outcome) => {
            state.status = RunStatus::Completed;
            (Some(outcome.label()), None, None)
        }
        Err(failure) => {
            if state.failed_stage.is_none() {
                state.stage_failed(failure.stage, failure.error.to_string());
            }
            (None, Some(failure.stage.name()), Some(failure.to_string()))
        }
    };

    {
        let store = store.lock().await;
        let completion = RunCompletion {
            status: state.status.as_str(),
            outcome,
            failed_stage,
            error: error.as_deref(),
            finished_at: &finished_at,
            duration_ms: duration,
        };
        if let Err(e) = store.complete_workflow_run(&state.id, &completion) {
            tracing::warn!(run = %state.id, error = %e, "failed to persist run completion");
        }
    }

    metrics::inc_run(outcome.unwrap_or("failed"));
    tracing::info!(
        run = %state.id,
        workflow_id = %state.workflow_id,
        status = state.status.as_str(),
        duration_ms = duration,
        "workflow run finished"
    );
}

/// Record a run whose task panicked as failed at the stage it was in.
async fn abandon_run(
    run_id: &str,
    message: String,
    active_runs: &mut HashMap<String, RunState>,
    store: &Arc<Mutex<Store>>,
) {
    let Some(mut state) = active_runs.remove(run_id) else {
        return;
    };
    let stage = state.current_stage();
    match stage {
        Some(stage) => state.stage_failed(stage, message.clone()),
        None => {
            state.status = RunStatus::Failed;
            state.error = Some(message.clone());
        }
    }

    let finished_at = now();
    let completion = RunCompletion {
        status: state.status.as_str(),
        failed_stage: stage.map(|s| s.name()),
        error: Some(message.as_str()),
        finished_at: &finished_at,
        duration_ms: state.started_at.elapsed().as_millis() as i64,
        ..Default::default()
    };
    if let Err(e) = store.lock().await.complete_workflow_run(&state.id, &completion) {
        tracing::warn!(run = %state.id, error = %e, "failed to persist run failure");
    }
    metrics::inc_run("failed");
}

fn abnormal_exit_message(e: JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let payload = e.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| format!("run panicked: {s}"))
        .or_else(|| payload.downcast_ref::<String>().map(|s| format!("run panicked: {s}")))
        .unwrap_or_else(|| "run panicked".to_string())
}
