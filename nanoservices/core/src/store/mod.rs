pub mod db;

pub use db::{RunCompletion, StageRunRow, Store, WorkflowRunRow};
