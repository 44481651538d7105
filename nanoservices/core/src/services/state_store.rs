//! Key-value store holding each workflow's configuration document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sourcesense_utils::error::Error;
use tokio::sync::RwLock;

use crate::config::types::WorkflowConfig;

#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    /// Nothing is stored under the key yet.
    #[error("no configuration stored for workflow '{0}'")]
    NotFound(String),
    #[error("state store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored configuration is invalid: {0}")]
    Invalid(#[from] serde_json::Error),
    #[error("invalid workflow id '{0}'")]
    InvalidKey(String),
}

impl StateStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StateStoreError::NotFound(_))
    }
}

impl From<StateStoreError> for Error {
    fn from(e: StateStoreError) -> Self {
        match e {
            StateStoreError::NotFound(_) => Error::NotFound(e.to_string()),
            other => Error::StateStore(other.to_string()),
        }
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, workflow_id: &str) -> Result<WorkflowConfig, StateStoreError>;

    async fn put(&self, workflow_id: &str, config: &WorkflowConfig) -> Result<(), StateStoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    entries: RwLock<HashMap<String, WorkflowConfig>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, workflow_id: &str) -> Result<WorkflowConfig, StateStoreError> {
        self.entries
            .read()
            .await
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| StateStoreError::NotFound(workflow_id.to_string()))
    }

    async fn put(&self, workflow_id: &str, config: &WorkflowConfig) -> Result<(), StateStoreError> {
        self.entries
            .write()
            .await
            .insert(workflow_id.to_string(), config.clone());
        Ok(())
    }
}

/// One `<workflow_id>.json` document per workflow under a directory.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    fn path_for(&self, workflow_id: &str) -> Result<PathBuf, StateStoreError> {
        let valid = !workflow_id.is_empty()
            && workflow_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !workflow_id.starts_with('.');
        if !valid {
            return Err(StateStoreError::InvalidKey(workflow_id.to_string()));
        }
        Ok(self.dir.join(format!("{workflow_id}.json")))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, workflow_id: &str) -> Result<WorkflowConfig, StateStoreError> {
        let path = self.path_for(workflow_id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StateStoreError::NotFound(workflow_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn put(&self, workflow_id: &str, config: &WorkflowConfig) -> Result<(), StateStoreError> {
        let path = self.path_for(workflow_id)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(config)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
