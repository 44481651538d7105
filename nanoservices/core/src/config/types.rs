use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_CONNECTION_QUALIFIED_NAME: &str = "default/github/connection";
pub const DEFAULT_CONNECTION_NAME: &str = "github-default";

/// Process-wide settings, usually loaded from a YAML file.
///
/// Durations are written as strings (`"60s"`, `"2m"`, `"500ms"`) and parsed
/// with [`crate::config::loader::parse_duration`].
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub staging: StagingConfig,
    pub catalog: CatalogConfig,
    pub retry: RetryConfig,
    pub timeouts: TimeoutConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub request_timeout: String,
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: "30s".to_string(),
            user_agent: "sourcesense".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Local directory every run's output path is rooted under.
    pub root: String,
    /// Rows per Parquet chunk.
    pub chunk_size: usize,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            root: "./local/tmp".to_string(),
            chunk_size: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Root of the object store that staged files are uploaded to.
    pub object_store_root: String,
    /// Root the catalog ingests published files from.
    pub root: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            object_store_root: "./local/objectstore".to_string(),
            root: "./local/catalog".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: "2s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub resolve_config: String,
    pub preflight: String,
    pub fetch: String,
    pub transform: String,
    pub publish: String,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            resolve_config: "1m".to_string(),
            preflight: "2m".to_string(),
            fetch: "15m".to_string(),
            transform: "10m".to_string(),
            publish: "10m".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file for run history. In-memory when unset.
    pub db_path: Option<String>,
    /// Directory of per-workflow config documents. In-memory when unset.
    pub state_dir: Option<String>,
}

/// Source-specific parameters of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Connection the published entities belong to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_name: Option<String>,
}

impl ConnectionContext {
    pub fn new(qualified_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            connection_qualified_name: Some(qualified_name.into()),
            connection_name: Some(name.into()),
        }
    }

    pub fn qualified_name(&self) -> &str {
        self.connection_qualified_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_CONNECTION_QUALIFIED_NAME)
    }

    pub fn name(&self) -> &str {
        self.connection_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_CONNECTION_NAME)
    }
}

/// Resolved parameters of a single workflow run.
///
/// Written by the triggering system as a JSON document keyed by workflow id,
/// then augmented by the resolve-config stage with ids and output paths.
/// Later stages only append path references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub workflow_id: String,
    #[serde(default)]
    pub workflow_run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(default)]
    pub metadata: SourceMetadata,
    #[serde(default)]
    pub credentials: Map<String, Value>,
    #[serde(default)]
    pub connection: ConnectionContext,
    /// Object-store prefix of the raw dataset, set after fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_store_path: Option<String>,
    /// Object-store prefix of the transformed output, set after transform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformed_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowConfig {
    pub fn for_owner(owner: impl Into<String>, token: impl Into<String>) -> Self {
        let mut credentials = Map::new();
        credentials.insert("token".to_string(), Value::String(token.into()));
        Self {
            metadata: SourceMetadata {
                owner: Some(owner.into()),
                extra: Map::new(),
            },
            credentials,
            ..Self::default()
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.metadata.owner.as_deref().filter(|o| !o.trim().is_empty())
    }
}
