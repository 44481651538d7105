//! External collaborators the pipeline talks to, behind traits.

pub mod object_store;
pub mod state_store;

pub use object_store::{LocalObjectStore, MigrationSummary, ObjectStore};
pub use state_store::{FileStateStore, InMemoryStateStore, StateStore, StateStoreError};
