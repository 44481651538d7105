//! The five-stage extraction workflow.
//!
//! A run resolves its configuration, validates the scope, fetches and stages
//! raw records, normalizes them into catalog entities and publishes them.
//! Stages run strictly in order, each under its own timeout. Fetch and
//! transform can end a run early, successfully, when they produce nothing.

use std::fmt;

use sourcesense_utils::error::Error;

use crate::pipeline::stats::ActivityStatistics;

pub mod activities;
pub mod helpers;
pub mod settings;
pub mod stats;
pub mod workflow;

pub use activities::{ExtractionActivities, PreflightReport, RepositoryActivities};
pub use settings::{PipelineSettings, StageTimeouts};
pub use stats::{FetchOutcome, StageOutput, TransformOutcome};
pub use workflow::{Workflow, WorkflowEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ResolveConfig,
    Preflight,
    Fetch,
    Transform,
    Publish,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::ResolveConfig,
        Stage::Preflight,
        Stage::Fetch,
        Stage::Transform,
        Stage::Publish,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::ResolveConfig => "resolve_config",
            Stage::Preflight => "preflight",
            Stage::Fetch => "fetch",
            Stage::Transform => "transform",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A run that stopped at a stage. Carries the stage name for run status.
#[derive(Debug, thiserror::Error)]
#[error("stage '{stage}' failed: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub error: Error,
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// All five stages ran.
    Completed {
        fetched: ActivityStatistics,
        transformed: ActivityStatistics,
        published: ActivityStatistics,
    },
    /// Fetch found nothing; transform and publish were skipped.
    NoRecords,
    /// Normalization produced nothing; publish was skipped.
    NoEntities { fetched: ActivityStatistics },
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Completed { .. } => "completed",
            RunOutcome::NoRecords => "no_records",
            RunOutcome::NoEntities { .. } => "no_entities",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_names_the_stage() {
        let failure = StageFailure {
            stage: Stage::Preflight,
            error: Error::NotFound("GitHub user or organization 'ghost' not found".into()),
        };
        let message = failure.to_string();
        assert!(message.starts_with("stage 'preflight' failed"));
        assert!(message.contains("ghost"));
    }

    #[test]
    fn stages_are_ordered() {
        let names: Vec<_> = Stage::ALL.iter().map(Stage::name).collect();
        assert_eq!(names, ["resolve_config", "preflight", "fetch", "transform", "publish"]);
    }
}
