use serde::{Deserialize, Serialize};

/// Summary attached to each stage's output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityStatistics {
    pub total_record_count: usize,
    pub chunk_count: usize,
    pub typename: String,
}

impl ActivityStatistics {
    pub fn new(total_record_count: usize, chunk_count: usize, typename: impl Into<String>) -> Self {
        Self { total_record_count, chunk_count, typename: typename.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.total_record_count == 0
    }
}

/// What a non-empty fetch or transform hands to the next stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput {
    pub stats: ActivityStatistics,
    /// Object-store prefix the stage uploaded to.
    pub object_store_path: String,
}

pub type FetchOutcome = StageOutput;
pub type TransformOutcome = StageOutput;
