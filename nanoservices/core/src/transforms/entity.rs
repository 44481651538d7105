//! Canonical catalog entity and the table of supported logical types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sourcesense_utils::error::Error;
use sourcesense_utils::SourceSenseResult;

use crate::transforms::repository::RepositoryMapper;
use crate::transforms::traits::EntityMapper;

/// Lifecycle status the catalog stores entities with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    Active,
}

/// Core attributes every catalog entity carries. Provenance keys go in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAttributes {
    pub name: Option<String>,
    pub qualified_name: String,
    pub connection_qualified_name: String,
    pub description: Option<String>,
    pub source_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The normalized envelope published to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEntity {
    pub type_name: String,
    pub attributes: EntityAttributes,
    pub custom_attributes: Map<String, Value>,
    pub status: EntityStatus,
}

/// Logical source types with a registered mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Repository,
}

impl EntityKind {
    pub const ALL: &'static [EntityKind] = &[EntityKind::Repository];

    /// Resolve a logical type name, case-insensitively.
    pub fn from_type_name(type_name: &str) -> SourceSenseResult<Self> {
        match type_name.trim().to_ascii_uppercase().as_str() {
            "REPOSITORY" => Ok(EntityKind::Repository),
            other => Err(Error::UnknownType(other.to_string())),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::Repository => "REPOSITORY",
        }
    }

    pub fn mapper(&self) -> &'static dyn EntityMapper {
        match self {
            EntityKind::Repository => &RepositoryMapper,
        }
    }
}

/// Deterministic catalog key: same connection and natural key, same name.
pub fn qualified_name(connection_qualified_name: &str, natural_key: &str) -> String {
    format!(
        "{}/{}",
        connection_qualified_name.trim_end_matches('/'),
        natural_key.trim_start_matches('/')
    )
}

/// Keep only characters the catalog can store; everything else is stripped.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii() && (!c.is_ascii_control() || matches!(c, '\n' | '\t')))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_resolve_case_insensitively() {
        assert_eq!(EntityKind::from_type_name("repository").unwrap(), EntityKind::Repository);
        assert_eq!(EntityKind::from_type_name(" REPOSITORY ").unwrap(), EntityKind::Repository);
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_type_name(kind.type_name()).unwrap(), *kind);
        }
    }

    #[test]
    fn unknown_type_name_fails_explicitly() {
        let err = EntityKind::from_type_name("pull_request").unwrap_err();
        assert!(matches!(err, Error::UnknownType(ref t) if t == "PULL_REQUEST"));
    }

    #[test]
    fn qualified_name_is_pure() {
        let a = qualified_name("default/api/1712345678", "octocat/Hello-World");
        let b = qualified_name("default/api/1712345678", "octocat/Hello-World");
        assert_eq!(a, b);
        assert_eq!(a, "default/api/1712345678/octocat/Hello-World");
        assert_eq!(qualified_name("conn/", "/repo"), "conn/repo");
    }

    #[test]
    fn sanitize_strips_non_ascii() {
        assert_eq!(sanitize_text("Fast 🚀 parser — café"), "Fast  parser  caf");
        assert_eq!(sanitize_text("line\nbreak\u{0}"), "line\nbreak");
    }

    #[test]
    fn entity_serializes_in_catalog_shape() {
        let entity = CanonicalEntity {
            type_name: "Resource".to_string(),
            attributes: EntityAttributes {
                name: Some("Hello-World".into()),
                qualified_name: "c/octocat/Hello-World".into(),
                connection_qualified_name: "c".into(),
                ..EntityAttributes::default()
            },
            custom_attributes: Map::new(),
            status: EntityStatus::Active,
        };
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["typeName"], "Resource");
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["attributes"]["qualifiedName"], "c/octocat/Hello-World");
        assert_eq!(json["attributes"]["connectionQualifiedName"], "c");
        assert!(json["customAttributes"].is_object());
    }
}
