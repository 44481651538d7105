pub mod entity;
pub mod flatten;
pub mod normalizer;
pub mod repository;
pub mod traits;

pub use entity::{CanonicalEntity, EntityKind};
pub use flatten::{flatten, FlatRecord, RawRecord};
pub use normalizer::{NormalizationReport, Normalizer, RunProvenance};
pub use traits::EntityMapper;
