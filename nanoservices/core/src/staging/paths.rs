//! The one mapping between local staging paths and object-store prefixes.
//!
//! Fetch, transform and publish all address data through these functions, so
//! `local_path(object_store_prefix(p, root), root) == p` for every `p` under `root`.

use std::path::{Component, Path, PathBuf};

use sourcesense_utils::error::Error;
use sourcesense_utils::SourceSenseResult;

pub const APPLICATION_NAME: &str = "sourcesense";

/// Per-run output directory, relative to the staging root.
pub fn build_output_path(workflow_id: &str, workflow_run_id: &str) -> String {
    format!("artifacts/apps/{APPLICATION_NAME}/workflows/{workflow_id}/{workflow_run_id}")
}

/// Directory holding the raw staged dataset of one logical type.
pub fn raw_dir(output_path: impl AsRef<Path>, type_name: &str) -> PathBuf {
    output_path.as_ref().join("raw").join(type_name)
}

/// Directory holding the transformed, publishable output.
pub fn transformed_dir(output_path: impl AsRef<Path>) -> PathBuf {
    output_path.as_ref().join("transformed")
}

/// Object-store prefix for a local path under `staging_root`.
///
/// Always `/`-separated and relative. Paths outside the root, or containing
/// `..`, are rejected instead of being silently re-rooted.
pub fn object_store_prefix(local: impl AsRef<Path>, staging_root: impl AsRef<Path>) -> SourceSenseResult<String> {
    let local = local.as_ref();
    let relative = local.strip_prefix(staging_root.as_ref()).map_err(|_| {
        Error::Configuration(format!(
            "{} is not under the staging root {}",
            local.display(),
            staging_root.as_ref().display()
        ))
    })?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(Error::Configuration(format!(
                    "{} cannot be mapped to an object-store prefix",
                    local.display()
                )))
            }
        }
    }
    Ok(segments.join("/"))
}

/// Local path for an object-store prefix; the inverse of [`object_store_prefix`].
pub fn local_path(prefix: &str, staging_root: impl AsRef<Path>) -> SourceSenseResult<PathBuf> {
    let mut path = staging_root.as_ref().to_path_buf();
    for segment in prefix.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(Error::Configuration(format!("invalid object-store prefix '{prefix}'")));
        }
        path.push(segment);
    }
    Ok(path)
}
