use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sourcesense_utils::SourceSenseResult;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use super::Destination;
use crate::pipeline::stats::ActivityStatistics;
use crate::transforms::entity::CanonicalEntity;

/// Writes entities as JSON lines to `<root>/<TYPENAME>/chunk-0.json`.
#[derive(Debug, Clone)]
pub struct JsonLinesDestination {
    root: PathBuf,
}

impl JsonLinesDestination {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Destination for JsonLinesDestination {
    fn name(&self) -> &str { "json_lines" }

    async fn load(&self, entities: &[CanonicalEntity], type_name: &str) -> SourceSenseResult<ActivityStatistics> {
        write_entities(entities, &self.root, type_name).await
    }
}

/// Clear `dir` and write the entities of one type as a single JSON-lines chunk.
pub async fn write_entities(
    entities: &[CanonicalEntity],
    dir: impl AsRef<Path>,
    type_name: &str,
) -> SourceSenseResult<ActivityStatistics> {
    let dir = dir.as_ref();
    if tokio::fs::try_exists(dir).await? {
        tokio::fs::remove_dir_all(dir).await?;
    }
    if entities.is_empty() {
        return Ok(ActivityStatistics::new(0, 0, type_name));
    }

    let type_dir = dir.join(type_name);
    tokio::fs::create_dir_all(&type_dir).await?;
    let mut file = File::create(type_dir.join("chunk-0.json")).await?;
    for entity in entities {
        let mut line = serde_json::to_vec(entity)?;
        line.push(b'\n');
        file.write_all(&line).await?;
    }
    file.flush().await?;
    file.shutdown().await?;

    tracing::info!(dir = %type_dir.display(), entities = entities.len(), "transformed output written");
    Ok(ActivityStatistics::new(entities.len(), 1, type_name))
}

/// Read back entities written by [`write_entities`].
pub async fn read_entities(path: impl AsRef<Path>) -> SourceSenseResult<Vec<CanonicalEntity>> {
    let text = tokio::fs::read_to_string(path).await?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(Into::into))
        .collect()
}
