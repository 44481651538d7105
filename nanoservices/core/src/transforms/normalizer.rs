use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sourcesense_utils::SourceSenseResult;
use tracing::{debug, warn};

use crate::config::types::{ConnectionContext, WorkflowConfig};
use crate::transforms::entity::{CanonicalEntity, EntityKind, EntityStatus};
use crate::transforms::flatten::FlatRecord;

/// Which run produced an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RunProvenance {
    pub workflow_id: String,
    pub workflow_run_id: String,
    pub extracted_at: DateTime<Utc>,
}

impl RunProvenance {
    pub fn new(workflow_id: impl Into<String>, workflow_run_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            workflow_run_id: workflow_run_id.into(),
            extracted_at: Utc::now(),
        }
    }

    pub fn at(mut self, extracted_at: DateTime<Utc>) -> Self {
        self.extracted_at = extracted_at;
        self
    }
}

/// Outcome of normalizing a batch. Per-record failures do not abort the batch.
#[derive(Debug, Default)]
pub struct NormalizationReport {
    pub entities: Vec<CanonicalEntity>,
    pub failures: usize,
}

/// Turns flat rows into catalog entities for one run.
#[derive(Debug, Clone)]
pub struct Normalizer {
    connection: ConnectionContext,
    provenance: RunProvenance,
}

impl Normalizer {
    pub fn new(connection: ConnectionContext, provenance: RunProvenance) -> Self {
        Self { connection, provenance }
    }

    pub fn for_run(config: &WorkflowConfig) -> Self {
        Self::new(
            config.connection.clone(),
            RunProvenance::new(&config.workflow_id, &config.workflow_run_id),
        )
    }

    /// Normalize one row of the given logical type.
    pub fn normalize(&self, record: &FlatRecord, type_name: &str) -> SourceSenseResult<CanonicalEntity> {
        let kind = EntityKind::from_type_name(type_name)?;
        let mapper = kind.mapper();
        let mut parts = mapper
            .map(record, &self.connection)
            .inspect_err(|e| debug!(mapper = mapper.name(), error = %e, "mapper rejected record"))?;

        let p = &self.provenance;
        let attrs = &mut parts.attributes.extra;
        attrs.insert("connectionName".into(), Value::from(self.connection.name()));
        attrs.insert("lastSyncWorkflowName".into(), Value::from(p.workflow_id.as_str()));
        attrs.insert("lastSyncRun".into(), Value::from(p.workflow_run_id.as_str()));
        attrs.insert("lastSyncRunAt".into(), Value::from(p.extracted_at.timestamp_millis()));

        let custom = &mut parts.custom_attributes;
        custom.insert("workflow_id".into(), Value::from(p.workflow_id.as_str()));
        custom.insert("workflow_run_id".into(), Value::from(p.workflow_run_id.as_str()));
        custom.insert(
            "extracted_at".into(),
            Value::from(p.extracted_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        Ok(CanonicalEntity {
            type_name: mapper.catalog_type().to_string(),
            attributes: parts.attributes,
            custom_attributes: parts.custom_attributes,
            status: EntityStatus::Active,
        })
    }

    /// Normalize a batch, skipping and counting records that fail.
    ///
    /// Only record-level errors are absorbed; anything else is returned.
    pub fn normalize_all(&self, records: &[FlatRecord], type_name: &str) -> SourceSenseResult<NormalizationReport> {
        let mut report = NormalizationReport::default();
        for (index, record) in records.iter().enumerate() {
            match self.normalize(record, type_name) {
                Ok(entity) => report.entities.push(entity),
                Err(e) if e.is_record_level() => {
                    warn!(index, type_name, error = %e, "skipping record that failed normalization");
                    report.failures += 1;
                }
                Err(e) => return Err(e),
            }
        }
        debug!(
            type_name,
            entities = report.entities.len(),
            failures = report.failures,
            "normalized batch"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sourcesense_utils::error::Error;
    use serde_json::json;

    fn record(value: Value) -> FlatRecord {
        FlatRecord::from_flat(value.as_object().unwrap().clone())
    }

    fn normalizer() -> Normalizer {
        let at = Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap();
        Normalizer::new(
            ConnectionContext::new("default/api/1700000000", "github-prod"),
            RunProvenance::new("wf-42", "run-7").at(at),
        )
    }

    #[test]
    fn normalize_is_deterministic() {
        let n = normalizer();
        let row = record(json!({"name": "Hello-World", "full_name": "octocat/Hello-World"}));
        let first = n.normalize(&row, "REPOSITORY").unwrap();
        let second = n.normalize(&row, "REPOSITORY").unwrap();
        assert_eq!(first.attributes.qualified_name, second.attributes.qualified_name);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn provenance_is_merged_into_every_entity() {
        let row = record(json!({"name": "x", "full_name": "octocat/x"}));
        let entity = normalizer().normalize(&row, "repository").unwrap();

        assert_eq!(entity.type_name, "Resource");
        assert_eq!(entity.status, EntityStatus::Active);
        assert_eq!(entity.attributes.extra["lastSyncWorkflowName"], json!("wf-42"));
        assert_eq!(entity.attributes.extra["lastSyncRun"], json!("run-7"));
        assert_eq!(entity.attributes.extra["connectionName"], json!("github-prod"));
        assert_eq!(entity.custom_attributes["workflow_run_id"], json!("run-7"));
        assert_eq!(entity.custom_attributes["extracted_at"], json!("2026-10-01T12:00:00.000Z"));
    }

    #[test]
    fn unknown_type_fails_single_record() {
        let row = record(json!({"full_name": "octocat/x"}));
        let err = normalizer().normalize(&row, "GIST").unwrap_err();
        assert!(matches!(err, Error::UnknownType(_)));
    }

    #[test]
    fn batch_skips_and_counts_bad_records() {
        let rows = vec![
            record(json!({"name": "a", "full_name": "octocat/a"})),
            record(json!({"name": "no-key"})),
            record(json!({"name": "b", "full_name": "octocat/b"})),
        ];
        let report = normalizer().normalize_all(&rows, "REPOSITORY").unwrap();
        assert_eq!(report.entities.len(), 2);
        assert_eq!(report.failures, 1);
    }

    #[test]
    fn batch_with_unknown_type_counts_every_record() {
        let rows = vec![record(json!({"full_name": "octocat/a"}))];
        let report = normalizer().normalize_all(&rows, "TEAM").unwrap();
        assert!(report.entities.is_empty());
        assert_eq!(report.failures, 1);
    }
}
