use std::collections::HashMap;

use crate::pipeline::Stage;

/// Status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Triggered,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Triggered => "triggered",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

/// Status of an individual stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Waiting,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Waiting => "waiting",
            StageStatus::Running => "running",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }
}

/// In-memory state for a single workflow run.
#[derive(Debug)]
pub struct RunState {
    pub id: String,
    pub workflow_id: String,
    pub status: RunStatus,
    pub stage_statuses: HashMap<Stage, StageStatus>,
    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
    pub started_at: std::time::Instant,
}

impl RunState {
    pub fn new(id: String, workflow_id: String) -> Self {
        Self {
            id,
            workflow_id,
            status: RunStatus::Triggered,
            stage_statuses: Stage::ALL.iter().map(|s| (*s, StageStatus::Waiting)).collect(),
            failed_stage: None,
            error: None,
            started_at: std::time::Instant::now(),
        }
    }

    pub fn stage_started(&mut self, stage: Stage) {
        self.stage_statuses.insert(stage, StageStatus::Running);
        self.status = RunStatus::Running;
    }

    /// Record a finished stage. Completing the last stage completes the run.
    pub fn stage_completed(&mut self, stage: Stage) {
        self.stage_statuses.insert(stage, StageStatus::Completed);
        if self.stage_statuses.values().all(|s| *s == StageStatus::Completed) {
            self.status = RunStatus::Completed;
        }
    }

    /// Mark a stage as failed and skip everything after it.
    pub fn stage_failed(&mut self, stage: Stage, error: impl Into<String>) {
        self.stage_statuses.insert(stage, StageStatus::Failed);
        self.skip_waiting();
        self.failed_stage = Some(stage);
        self.error = Some(error.into());
        self.status = RunStatus::Failed;
    }

    /// The run ended early with nothing more to do.
    pub fn short_circuit(&mut self) {
        self.skip_waiting();
        self.status = RunStatus::Completed;
    }

    /// The stage currently running, if any.
    pub fn current_stage(&self) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|s| self.stage_statuses.get(s) == Some(&StageStatus::Running))
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::Failed)
    }

    fn skip_waiting(&mut self) {
        for status in self.stage_statuses.values_mut() {
            if *status == StageStatus::Waiting {
                *status = StageStatus::Skipped;
            }
        }
    }
}
