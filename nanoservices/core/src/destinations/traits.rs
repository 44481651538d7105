use async_trait::async_trait;
use sourcesense_utils::SourceSenseResult;

use crate::pipeline::stats::ActivityStatistics;
use crate::transforms::entity::CanonicalEntity;

/// Where normalized entities are staged before publishing.
#[async_trait]
pub trait Destination: Send + Sync {
    fn name(&self) -> &str;

    /// Write one logical type's entities, replacing anything staged before.
    async fn load(&self, entities: &[CanonicalEntity], type_name: &str) -> SourceSenseResult<ActivityStatistics>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::entity::{EntityAttributes, EntityStatus};
    use serde_json::Map;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDestination {
        count: AtomicUsize,
    }

    #[async_trait]
    impl Destination for CountingDestination {
        fn name(&self) -> &str { "counter" }
        async fn load(&self, entities: &[CanonicalEntity], type_name: &str) -> SourceSenseResult<ActivityStatistics> {
            self.count.fetch_add(entities.len(), Ordering::SeqCst);
            Ok(ActivityStatistics::new(entities.len(), 1, type_name))
        }
    }

    #[tokio::test]
    async fn destination_trait_works() {
        let dest = CountingDestination { count: AtomicUsize::new(0) };
        let entity = CanonicalEntity {
            type_name: "Resource".into(),
            attributes: EntityAttributes { qualified_name: "c/a/b".into(), ..Default::default() },
            custom_attributes: Map::new(),
            status: EntityStatus::Active,
        };

        let stats = dest.load(&[entity.clone(), entity], "REPOSITORY").await.unwrap();
        assert_eq!(dest.name(), "counter");
        assert_eq!(stats.total_record_count, 2);
        assert_eq!(dest.count.load(Ordering::SeqCst), 2);
    }
}
