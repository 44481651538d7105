//! Blob storage between stages, and the hand-off into the catalog.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sourcesense_utils::SourceSenseResult;
use tracing::{debug, warn};

use crate::staging::paths::local_path;

const COPY_CONCURRENCY: usize = 8;

/// Per-item outcome of moving a prefix into the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub migrated_files: usize,
    pub failed_migrations: usize,
    pub total_files: usize,
    pub failures: Vec<String>,
}

impl MigrationSummary {
    pub fn has_failures(&self) -> bool {
        self.failed_migrations > 0 || !self.failures.is_empty()
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy every file under `local` to `remote`. Returns the number of files.
    async fn upload_prefix(&self, local: &Path, remote: &str) -> SourceSenseResult<usize>;

    /// Copy every object under `remote` into `local`. Returns the number of files.
    async fn download_prefix(&self, remote: &str, local: &Path) -> SourceSenseResult<usize>;

    /// Move everything under `prefix` into the catalog, one item per file.
    async fn migrate_to_catalog(&self, prefix: &str) -> SourceSenseResult<MigrationSummary>;
}

/// Object store and catalog both backed by local directories.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    catalog_root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, catalog_root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), catalog_root: catalog_root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog_root(&self) -> &Path {
        &self.catalog_root
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload_prefix(&self, local: &Path, remote: &str) -> SourceSenseResult<usize> {
        let target = local_path(remote, &self.root)?;
        let copied = replace_tree(local, &target).await?;
        debug!(local = %local.display(), remote, files = copied, "uploaded prefix");
        Ok(copied)
    }

    async fn download_prefix(&self, remote: &str, local: &Path) -> SourceSenseResult<usize> {
        let source = local_path(remote, &self.root)?;
        let copied = replace_tree(&source, local).await?;
        debug!(remote, local = %local.display(), files = copied, "downloaded prefix");
        Ok(copied)
    }

    async fn migrate_to_catalog(&self, prefix: &str) -> SourceSenseResult<MigrationSummary> {
        let source = local_path(prefix, &self.root)?;
        let target = local_path(prefix, &self.catalog_root)?;
        let files = list_files(&source).await?;

        let outcomes: Vec<(PathBuf, std::io::Result<()>)> = stream::iter(files)
            .map(|relative| {
                let from = source.join(&relative);
                let to = target.join(&relative);
                async move { (relative, copy_file(&from, &to).await) }
            })
            .buffer_unordered(COPY_CONCURRENCY)
            .collect()
            .await;

        let mut summary = MigrationSummary { total_files: outcomes.len(), ..Default::default() };
        for (relative, outcome) in outcomes {
            match outcome {
                Ok(()) => summary.migrated_files += 1,
                Err(e) => {
                    warn!(file = %relative.display(), error = %e, "catalog migration failed");
                    summary.failed_migrations += 1;
                    summary.failures.push(format!("{}: {e}", relative.display()));
                }
            }
        }
        Ok(summary)
    }
}

/// Files under `dir`, relative to it. A missing directory has no files.
async fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !tokio::fs::try_exists(dir).await? {
        return Ok(files);
    }
    let mut pending = vec![PathBuf::new()];
    while let Some(relative) = pending.pop() {
        let mut entries = tokio::fs::read_dir(dir.join(&relative)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let child = relative.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push(child);
            } else {
                files.push(child);
            }
        }
    }
    files.sort();
    Ok(files)
}

async fn copy_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(from, to).await.map(|_| ())
}

/// Make `to` an exact copy of `from`. Whatever `to` held before is removed.
async fn replace_tree(from: &Path, to: &Path) -> std::io::Result<usize> {
    if tokio::fs::try_exists(to).await? {
        tokio::fs::remove_dir_all(to).await?;
    }
    copy_tree(from, to).await
}

async fn copy_tree(from: &Path, to: &Path) -> std::io::Result<usize> {
    let files = list_files(from).await?;
    for relative in &files {
        copy_file(&from.join(relative), &to.join(relative)).await?;
    }
    Ok(files.len())
}
