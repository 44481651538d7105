use serde_json::{Map, Value};
use sourcesense_utils::error::Error;
use sourcesense_utils::SourceSenseResult;

use crate::config::types::ConnectionContext;
use crate::transforms::entity::{qualified_name, sanitize_text, EntityAttributes};
use crate::transforms::flatten::FlatRecord;
use crate::transforms::traits::{EntityMapper, EntityParts};

const COUNTERS: &[(&str, &str)] = &[
    ("stargazers_count", "github_stargazers_count"),
    ("watchers_count", "github_watchers_count"),
    ("forks_count", "github_forks_count"),
    ("open_issues_count", "github_open_issues_count"),
];

const FLAGS: &[(&str, &str)] = &[
    ("private", "github_is_private"),
    ("fork", "github_is_fork"),
];

/// Maps GitHub repository rows onto the generic `Resource` catalog type.
///
/// The natural key is `full_name` (`owner/repo`); rows without one cannot get
/// a stable qualified name and are rejected.
pub struct RepositoryMapper;

impl EntityMapper for RepositoryMapper {
    fn name(&self) -> &str { "repository" }

    fn catalog_type(&self) -> &str { "Resource" }

    fn map(&self, record: &FlatRecord, connection: &ConnectionContext) -> SourceSenseResult<EntityParts> {
        let full_name = record
            .get_str("full_name")
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::InvalidRecord("repository has no full_name".to_string()))?;
        let connection_qualified_name = connection.qualified_name();

        let attributes = EntityAttributes {
            name: clean(record, "name"),
            qualified_name: qualified_name(connection_qualified_name, full_name),
            connection_qualified_name: connection_qualified_name.to_string(),
            description: clean(record, "description"),
            source_url: record.get_str("html_url").map(str::to_string),
            extra: Map::new(),
        };

        let mut custom_attributes = Map::new();
        custom_attributes.insert(
            "github_owner".to_string(),
            record.get("owner_login").clone(),
        );
        for (field, key) in FLAGS {
            let flag = record.get(field).as_bool().unwrap_or(false);
            custom_attributes.insert(key.to_string(), Value::Bool(flag));
        }
        for (field, key) in COUNTERS {
            let count = record.get(field).as_u64().unwrap_or(0);
            custom_attributes.insert(key.to_string(), Value::from(count));
        }
        custom_attributes.insert(
            "github_language".to_string(),
            clean(record, "language").map(Value::String).unwrap_or(Value::Null),
        );

        Ok(EntityParts { attributes, custom_attributes })
    }
}

fn clean(record: &FlatRecord, field: &str) -> Option<String> {
    record.get_str(field).map(sanitize_text)
}
