use std::time::Duration;

use uuid::Uuid;

/// What caused a run to be requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Submitted directly, after the caller stored the workflow's config
    Manual,
    /// Emitted by an interval schedule
    Interval(Duration),
}

impl Trigger {
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Manual => "manual",
            Trigger::Interval(_) => "interval",
        }
    }
}

/// A request to run the pipeline once for a workflow.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub workflow_id: String,
    /// Unique per run; keys the staging paths and history rows.
    pub run_id: String,
    pub trigger: Trigger,
}

impl RunRequest {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self::with_trigger(workflow_id, Trigger::Manual)
    }

    pub fn with_trigger(workflow_id: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: Uuid::new_v4().to_string(),
            trigger,
        }
    }
}
