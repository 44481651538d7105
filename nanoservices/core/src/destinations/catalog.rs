use std::sync::Arc;

use sourcesense_utils::error::Error;
use sourcesense_utils::SourceSenseResult;
use tracing::{error, info};

use crate::pipeline::stats::ActivityStatistics;
use crate::services::object_store::ObjectStore;

pub const PUBLISH_TYPENAME: &str = "catalog-upload-completed";

/// Moves a staged prefix into the catalog and judges the batch as a whole.
#[derive(Clone)]
pub struct PublishGateway {
    object_store: Arc<dyn ObjectStore>,
}

impl PublishGateway {
    pub fn new(object_store: Arc<dyn ObjectStore>) -> Self {
        Self { object_store }
    }

    /// Any failed item fails the whole publish, even when others migrated.
    pub async fn publish(&self, prefix: &str) -> SourceSenseResult<ActivityStatistics> {
        let summary = self.object_store.migrate_to_catalog(prefix).await?;
        if summary.has_failures() {
            error!(
                prefix,
                migrated = summary.migrated_files,
                failed = summary.failed_migrations,
                "catalog upload finished with failures"
            );
            return Err(Error::Publish {
                failed: summary.failed_migrations.max(summary.failures.len()),
                failures: summary.failures,
            });
        }

        info!(prefix, migrated = summary.migrated_files, total = summary.total_files, "catalog upload completed");
        Ok(ActivityStatistics::new(
            summary.migrated_files,
            summary.total_files,
            PUBLISH_TYPENAME,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::object_store::MigrationSummary;
    use async_trait::async_trait;
    use std::path::Path;

    struct FixedOutcome(MigrationSummary);

    #[async_trait]
    impl ObjectStore for FixedOutcome {
        async fn upload_prefix(&self, _: &Path, _: &str) -> SourceSenseResult<usize> { Ok(0) }
        async fn download_prefix(&self, _: &str, _: &Path) -> SourceSenseResult<usize> { Ok(0) }
        async fn migrate_to_catalog(&self, _: &str) -> SourceSenseResult<MigrationSummary> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn one_failure_fails_the_batch() {
        let gateway = PublishGateway::new(Arc::new(FixedOutcome(MigrationSummary {
            migrated_files: 2,
            failed_migrations: 1,
            total_files: 3,
            failures: vec!["REPOSITORY/chunk-2.json: rejected".into()],
        })));

        match gateway.publish("artifacts/x/transformed").await {
            Err(Error::Publish { failed, failures }) => {
                assert_eq!(failed, 1);
                assert_eq!(failures, vec!["REPOSITORY/chunk-2.json: rejected".to_string()]);
            }
            other => panic!("expected publish error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn clean_batch_reports_counts() {
        let gateway = PublishGateway::new(Arc::new(FixedOutcome(MigrationSummary {
            migrated_files: 3,
            total_files: 3,
            ..Default::default()
        })));
        let stats = gateway.publish("p").await.unwrap();
        assert_eq!(stats, ActivityStatistics::new(3, 3, PUBLISH_TYPENAME));
    }
}
