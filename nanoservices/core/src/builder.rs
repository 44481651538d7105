use std::sync::Arc;

use crate::config::loader::ConfigError;
use crate::config::types::AppConfig;
use crate::pipeline::{PipelineSettings, RepositoryActivities};
use crate::services::object_store::{LocalObjectStore, ObjectStore};
use crate::services::state_store::{FileStateStore, InMemoryStateStore, StateStore};
use crate::sources::http_client::{GitHubClientBuilder, GitHubSourceFactory};
use crate::sources::traits::SourceFactory;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("a state store is required")]
    NoStateStore,
    #[error("an object store is required")]
    NoObjectStore,
    #[error("a source is required")]
    NoSource,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid source configuration: {0}")]
    Source(#[from] sourcesense_utils::error::Error),
}

/// Assembles the activities a run needs from their collaborators.
#[derive(Default)]
pub struct WorkflowBuilder {
    settings: PipelineSettings,
    state_store: Option<Arc<dyn StateStore>>,
    object_store: Option<Arc<dyn ObjectStore>>,
    sources: Option<Arc<dyn SourceFactory>>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire up every collaborator from the application config.
    pub fn from_config(config: &AppConfig) -> Result<Self, BuildError> {
        let state_store: Arc<dyn StateStore> = match &config.store.state_dir {
            Some(dir) => Arc::new(FileStateStore::new(dir)),
            None => Arc::new(InMemoryStateStore::new()),
        };
        let client = GitHubClientBuilder::from_config(&config.source)?;
        Ok(Self::new()
            .settings(PipelineSettings::from_config(config)?)
            .state_store(state_store)
            .object_store(Arc::new(LocalObjectStore::new(
                &config.catalog.object_store_root,
                &config.catalog.root,
            )))
            .sources(Arc::new(GitHubSourceFactory::new(client))))
    }

    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    pub fn sources(mut self, sources: Arc<dyn SourceFactory>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn build(self) -> Result<RepositoryActivities, BuildError> {
        let state_store = self.state_store.ok_or(BuildError::NoStateStore)?;
        let object_store = self.object_store.ok_or(BuildError::NoObjectStore)?;
        let sources = self.sources.ok_or(BuildError::NoSource)?;
        Ok(RepositoryActivities::new(state_store, object_store, sources, self.settings))
    }
}
