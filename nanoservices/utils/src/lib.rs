pub mod error;

use arrow::record_batch::RecordBatch;
use error::Error;
use std::sync::Arc;

pub type SourceSenseResult<T> = Result<T, Error>;

/// Record batches produced for one staging write, shared cheaply between stages.
#[derive(Clone, Debug)]
pub struct StagedBatches(pub Arc<Vec<RecordBatch>>);

impl StagedBatches {
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        StagedBatches(Arc::new(batches))
    }
    pub fn batches(&self) -> &Vec<RecordBatch> {
        &self.0
    }
    pub fn num_rows(&self) -> usize {
        self.0.iter().map(|b| b.num_rows()).sum()
    }
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }
}
