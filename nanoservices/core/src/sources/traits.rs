use async_trait::async_trait;
use serde_json::{Map, Value};
use sourcesense_utils::SourceSenseResult;

use crate::transforms::flatten::RawRecord;

/// A remote API that lists the entities of one scope (user or organization).
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Human-readable name for logging and metrics
    fn name(&self) -> &str;

    /// Logical type name of the records this source produces
    fn produces(&self) -> &str;

    /// Every record of the scope, across all pages.
    async fn fetch_all(&self, scope: &str) -> SourceSenseResult<Vec<RawRecord>>;

    /// Lightweight check of the configured credentials.
    async fn test_authentication(&self) -> SourceSenseResult<bool>;

    /// Lightweight check that the scope exists.
    async fn check_scope_exists(&self, scope: &str) -> SourceSenseResult<bool>;
}

/// Builds an authenticated source for one run from that run's credentials.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    async fn connect(
        &self,
        credentials: &Map<String, Value>,
    ) -> SourceSenseResult<Box<dyn RepositorySource>>;
}
