use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sourcesense_utils::error::Error;
use sourcesense_utils::SourceSenseResult;
use tracing::{info, warn};

use crate::config::types::WorkflowConfig;
use crate::destinations::catalog::PublishGateway;
use crate::destinations::file::JsonLinesDestination;
use crate::destinations::traits::Destination;
use crate::metrics;
use crate::pipeline::helpers::{blocking, retry_when};
use crate::pipeline::settings::PipelineSettings;
use crate::pipeline::stats::{ActivityStatistics, FetchOutcome, TransformOutcome};
use crate::services::object_store::ObjectStore;
use crate::services::state_store::{StateStore, StateStoreError};
use crate::sources::traits::SourceFactory;
use crate::staging::dataset::{read_stage, staged_files, write_stage};
use crate::staging::paths::{build_output_path, local_path, object_store_prefix, raw_dir, transformed_dir};
use crate::transforms::flatten::{flatten, FlatRecord};
use crate::transforms::normalizer::Normalizer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreflightReport {
    pub status: String,
    pub message: String,
}

impl PreflightReport {
    pub fn success(owner: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: format!("found owner '{owner}'"),
        }
    }
}

/// The five stage operations of an extraction run.
///
/// `resolve_config`, `preflight` and `publish` have shared implementations;
/// a source type supplies `fetch` and `transform` and overrides the rest
/// only where it needs to.
#[async_trait]
pub trait ExtractionActivities: Send + Sync {
    fn state_store(&self) -> &dyn StateStore;

    fn object_store(&self) -> Arc<dyn ObjectStore>;

    fn settings(&self) -> &PipelineSettings;

    /// Read the stored configuration once and fill in ids and output paths.
    async fn resolve_config(&self, workflow_id: &str, workflow_run_id: &str) -> SourceSenseResult<WorkflowConfig> {
        require_workflow_id(workflow_id)?;
        let stored = self.state_store().get(workflow_id).await?;
        Ok(prepare_config(stored, workflow_id, workflow_run_id, self.settings()))
    }

    /// Validate the scope before any data is extracted.
    async fn preflight(&self, config: &WorkflowConfig) -> SourceSenseResult<PreflightReport> {
        let owner = require_owner(config)?;
        Ok(PreflightReport::success(owner))
    }

    /// Fetch, flatten and stage raw records. `None` when there are none.
    async fn fetch(&self, config: &WorkflowConfig) -> SourceSenseResult<Option<FetchOutcome>>;

    /// Normalize the staged records and stage the entities. `None` when no entity survives.
    async fn transform(&self, config: &WorkflowConfig, fetched: &FetchOutcome) -> SourceSenseResult<Option<TransformOutcome>>;

    async fn publish(&self, _config: &WorkflowConfig, transformed: &TransformOutcome) -> SourceSenseResult<ActivityStatistics> {
        PublishGateway::new(self.object_store())
            .publish(&transformed.object_store_path)
            .await
    }
}

fn require_workflow_id(workflow_id: &str) -> SourceSenseResult<()> {
    if workflow_id.trim().is_empty() {
        return Err(Error::Configuration("workflow_id is required".to_string()));
    }
    Ok(())
}

pub fn require_owner(config: &WorkflowConfig) -> SourceSenseResult<&str> {
    config
        .owner()
        .ok_or_else(|| Error::Configuration("owner not found in configuration metadata".to_string()))
}

/// Stamp run ids and output locations onto a stored config.
pub fn prepare_config(
    mut config: WorkflowConfig,
    workflow_id: &str,
    workflow_run_id: &str,
    settings: &PipelineSettings,
) -> WorkflowConfig {
    let prefix = config
        .output_prefix
        .clone()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| settings.staging_root.to_string_lossy().into_owned());
    let output_path = PathBuf::from(&prefix).join(build_output_path(workflow_id, workflow_run_id));

    config.output_path = Some(output_path.to_string_lossy().into_owned());
    config.output_prefix = Some(prefix);
    config.workflow_id = workflow_id.to_string();
    config.workflow_run_id = workflow_run_id.to_string();
    config
}

/// Root every staged path of the run is mapped against.
pub fn staging_root(config: &WorkflowConfig) -> SourceSenseResult<PathBuf> {
    config
        .output_prefix
        .as_deref()
        .map(PathBuf::from)
        .ok_or_else(|| Error::Configuration("output_prefix is not resolved".to_string()))
}

pub fn output_dir(config: &WorkflowConfig) -> SourceSenseResult<PathBuf> {
    config
        .output_path
        .as_deref()
        .map(PathBuf::from)
        .ok_or_else(|| Error::Configuration("output_path is not resolved".to_string()))
}

/// Activities for GitHub repositories.
pub struct RepositoryActivities {
    state_store: Arc<dyn StateStore>,
    object_store: Arc<dyn ObjectStore>,
    sources: Arc<dyn SourceFactory>,
    settings: PipelineSettings,
}

impl RepositoryActivities {
    pub fn new(
        state_store: Arc<dyn StateStore>,
        object_store: Arc<dyn ObjectStore>,
        sources: Arc<dyn SourceFactory>,
        settings: PipelineSettings,
    ) -> Self {
        Self { state_store, object_store, sources, settings }
    }
}

#[async_trait]
impl ExtractionActivities for RepositoryActivities {
    fn state_store(&self) -> &dyn StateStore {
        self.state_store.as_ref()
    }

    fn object_store(&self) -> Arc<dyn ObjectStore> {
        self.object_store.clone()
    }

    fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// The triggering side may still be writing the config when the run
    /// starts, so a missing document is retried. Nothing else is.
    async fn resolve_config(&self, workflow_id: &str, workflow_run_id: &str) -> SourceSenseResult<WorkflowConfig> {
        require_workflow_id(workflow_id)?;
        let stored = retry_when(
            self.settings.retry_attempts,
            self.settings.retry_delay,
            StateStoreError::is_not_found,
            |attempt| async move {
                let result = self.state_store.get(workflow_id).await;
                if result.is_ok() {
                    info!(workflow_id, attempt, "retrieved workflow configuration");
                }
                result
            },
        )
        .await?;
        Ok(prepare_config(stored, workflow_id, workflow_run_id, &self.settings))
    }

    async fn preflight(&self, config: &WorkflowConfig) -> SourceSenseResult<PreflightReport> {
        let owner = require_owner(config)?;
        let source = self.sources.connect(&config.credentials).await?;
        if !source.test_authentication().await? {
            return Err(Error::Authentication(
                "the provided token is invalid or expired".to_string(),
            ));
        }
        if !source.check_scope_exists(owner).await? {
            return Err(Error::NotFound(format!("user or organization '{owner}' not found")));
        }
        info!(owner, source = source.name(), "preflight check passed");
        Ok(PreflightReport::success(owner))
    }

    async fn fetch(&self, config: &WorkflowConfig) -> SourceSenseResult<Option<FetchOutcome>> {
        let owner = require_owner(config)?;
        let source = self.sources.connect(&config.credentials).await?;
        let raw = source.fetch_all(owner).await?;
        if raw.is_empty() {
            warn!(owner, source = source.name(), "no records found, skipping staging");
            return Ok(None);
        }

        let typename = source.produces().to_string();
        let records: Vec<FlatRecord> = raw.into_iter().map(flatten).collect();
        let dir = raw_dir(output_dir(config)?, &typename);
        let chunk_size = self.settings.chunk_size;
        let written = {
            let dir = dir.clone();
            blocking(move || write_stage(&records, &dir, chunk_size)).await?
        };

        let prefix = object_store_prefix(&dir, staging_root(config)?)?;
        self.object_store.upload_prefix(&dir, &prefix).await?;
        metrics::add_records_fetched(&typename, written.record_count);
        info!(
            owner,
            source = source.name(),
            records = written.record_count,
            object_store_path = %prefix,
            "raw records staged"
        );

        Ok(Some(FetchOutcome {
            stats: ActivityStatistics::new(written.record_count, written.chunk_count, typename),
            object_store_path: prefix,
        }))
    }

    async fn transform(&self, config: &WorkflowConfig, fetched: &FetchOutcome) -> SourceSenseResult<Option<TransformOutcome>> {
        let root = staging_root(config)?;
        let raw = local_path(&fetched.object_store_path, &root)?;
        if staged_files(&raw)?.is_empty() {
            self.object_store.download_prefix(&fetched.object_store_path, &raw).await?;
        }
        let records = {
            let raw = raw.clone();
            blocking(move || read_stage(&raw)).await?
        };
        if records.is_empty() {
            warn!(path = %raw.display(), "staged dataset is empty, skipping transformation");
            return Ok(None);
        }

        let typename = &fetched.stats.typename;
        let report = Normalizer::for_run(config).normalize_all(&records, typename)?;
        if report.failures > 0 {
            metrics::add_normalization_failures(typename, report.failures);
        }
        if report.entities.is_empty() {
            warn!(failures = report.failures, "normalization produced no entities");
            return Ok(None);
        }

        let out = transformed_dir(output_dir(config)?);
        let stats = JsonLinesDestination::new(&out).load(&report.entities, typename).await?;
        let prefix = object_store_prefix(&out, &root)?;
        self.object_store.upload_prefix(&out, &prefix).await?;
        info!(
            entities = stats.total_record_count,
            failures = report.failures,
            object_store_path = %prefix,
            "entities staged for publishing"
        );

        Ok(Some(TransformOutcome { stats, object_store_path: prefix }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn prepare_config_derives_output_path_from_prefix() {
        let settings = PipelineSettings::default().with_staging_root("/tmp/staging");
        let config = prepare_config(WorkflowConfig::for_owner("octocat", "t"), "wf-1", "run-1", &settings);

        assert_eq!(config.workflow_id, "wf-1");
        assert_eq!(config.workflow_run_id, "run-1");
        assert_eq!(config.output_prefix.as_deref(), Some("/tmp/staging"));
        assert_eq!(
            Path::new(config.output_path.as_deref().unwrap()),
            Path::new("/tmp/staging/artifacts/apps/sourcesense/workflows/wf-1/run-1")
        );
    }

    #[test]
    fn stored_prefix_wins_over_default() {
        let mut stored = WorkflowConfig::for_owner("octocat", "t");
        stored.output_prefix = Some("/data/runs".into());
        let config = prepare_config(stored, "wf", "run", &PipelineSettings::default());
        assert!(config.output_path.unwrap().starts_with("/data/runs/"));
    }

    #[test]
    fn missing_owner_is_a_configuration_error() {
        let mut config = WorkflowConfig::for_owner("  ", "t");
        assert!(matches!(require_owner(&config), Err(Error::Configuration(_))));
        config.metadata.owner = None;
        assert!(matches!(require_owner(&config), Err(Error::Configuration(_))));
    }
}
