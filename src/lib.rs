pub use sourcesense_core as core;
pub use sourcesense_utils as utils;

// Convenience re-exports for common usage
pub use sourcesense_core::builder::WorkflowBuilder;
pub use sourcesense_core::engine::SourceSense;
pub use sourcesense_core::events::trigger::{RunRequest, Trigger};
pub use sourcesense_core::pipeline::{ExtractionActivities, RepositoryActivities, RunOutcome, Stage, Workflow};
pub use sourcesense_core::sources::traits::{RepositorySource, SourceFactory};
pub use sourcesense_core::destinations::traits::Destination;
pub use sourcesense_utils::{SourceSenseResult, StagedBatches};
