use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use sourcesense_utils::SourceSenseResult;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::metrics;
use crate::pipeline::activities::ExtractionActivities;
use crate::pipeline::helpers::with_timeout;
use crate::pipeline::{RunOutcome, Stage, StageFailure};

/// Progress reported while a run executes.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    StageStarted {
        run_id: String,
        stage: Stage,
        started_at: String,
    },
    StageFinished {
        run_id: String,
        stage: Stage,
        started_at: String,
        finished_at: String,
        duration_ms: u64,
        error: Option<String>,
    },
    /// The run stopped early because a stage produced nothing.
    ShortCircuited {
        run_id: String,
        after: Stage,
    },
}

/// Drives one run through the stages of an [`ExtractionActivities`].
#[derive(Clone)]
pub struct Workflow {
    activities: Arc<dyn ExtractionActivities>,
    events: Option<mpsc::Sender<WorkflowEvent>>,
}

impl Workflow {
    pub fn new(activities: Arc<dyn ExtractionActivities>) -> Self {
        Self { activities, events: None }
    }

    /// Report stage progress on `events`.
    pub fn with_events(mut self, events: mpsc::Sender<WorkflowEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn run(&self, workflow_id: &str, run_id: &str) -> Result<RunOutcome, StageFailure> {
        let acts = self.activities.as_ref();
        info!(workflow_id, run = run_id, "starting extraction run");

        let mut config = self
            .stage(run_id, Stage::ResolveConfig, acts.resolve_config(workflow_id, run_id))
            .await?;

        let report = self.stage(run_id, Stage::Preflight, acts.preflight(&config)).await?;
        info!(run = run_id, message = %report.message, "preflight passed");

        let fetched = self.stage(run_id, Stage::Fetch, acts.fetch(&config)).await?;
        let Some(fetched) = fetched.filter(|f| !f.stats.is_empty()) else {
            info!(run = run_id, "no records fetched, finishing run");
            self.emit(WorkflowEvent::ShortCircuited { run_id: run_id.to_string(), after: Stage::Fetch }).await;
            return Ok(RunOutcome::NoRecords);
        };
        config.object_store_path = Some(fetched.object_store_path.clone());

        let transformed = self
            .stage(run_id, Stage::Transform, acts.transform(&config, &fetched))
            .await?;
        let Some(transformed) = transformed.filter(|t| !t.stats.is_empty()) else {
            info!(run = run_id, "no entities produced, finishing run");
            self.emit(WorkflowEvent::ShortCircuited { run_id: run_id.to_string(), after: Stage::Transform }).await;
            return Ok(RunOutcome::NoEntities { fetched: fetched.stats });
        };
        config.transformed_path = Some(transformed.object_store_path.clone());

        let published = self
            .stage(run_id, Stage::Publish, acts.publish(&config, &transformed))
            .await?;

        info!(
            run = run_id,
            records = fetched.stats.total_record_count,
            entities = transformed.stats.total_record_count,
            published = published.total_record_count,
            "extraction run completed"
        );
        Ok(RunOutcome::Completed {
            fetched: fetched.stats,
            transformed: transformed.stats,
            published,
        })
    }

    async fn stage<T, Fut>(&self, run_id: &str, stage: Stage, fut: Fut) -> Result<T, StageFailure>
    where
        Fut: Future<Output = SourceSenseResult<T>>,
    {
        let limit = self.activities.settings().timeouts.for_stage(stage);
        let started_at = now();
        let started = Instant::now();
        self.emit(WorkflowEvent::StageStarted {
            run_id: run_id.to_string(),
            stage,
            started_at: started_at.clone(),
        })
        .await;

        let result = with_timeout(stage, limit, fut).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        metrics::observe_stage_duration(stage.name(), duration_ms as f64);

        self.emit(WorkflowEvent::StageFinished {
            run_id: run_id.to_string(),
            stage,
            started_at,
            finished_at: now(),
            duration_ms,
            error: result.as_ref().err().map(|e| e.to_string()),
        })
        .await;

        result.map_err(|error| {
            error!(run = run_id, stage = %stage, kind = error.kind(), error = %error, "stage failed");
            metrics::inc_failure(stage.name(), error.kind());
            StageFailure { stage, error }
        })
    }

    async fn emit(&self, event: WorkflowEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
