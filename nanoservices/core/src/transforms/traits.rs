use serde_json::{Map, Value};
use sourcesense_utils::SourceSenseResult;

use crate::config::types::ConnectionContext;
use crate::transforms::entity::EntityAttributes;
use crate::transforms::flatten::FlatRecord;

/// Attribute sets a mapper builds for one record, before provenance is merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityParts {
    pub attributes: EntityAttributes,
    pub custom_attributes: Map<String, Value>,
}

/// Maps flat rows of one logical type into catalog attributes.
pub trait EntityMapper: Send + Sync {
    fn name(&self) -> &str;

    /// Catalog type name the produced entities carry
    fn catalog_type(&self) -> &str;

    fn map(&self, record: &FlatRecord, connection: &ConnectionContext) -> SourceSenseResult<EntityParts>;
}
