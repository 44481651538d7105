pub mod dataset;
pub mod paths;

pub use dataset::{read_stage, write_stage, StageWrite};
pub use paths::{build_output_path, local_path, object_store_prefix};
