//! Parquet staging of flat records.
//!
//! Schemas are inferred from the records themselves, so heterogeneous API
//! payloads stage without a declared schema. All-null columns are widened to
//! `Utf8` because Parquet has no storage for Arrow's `Null` type.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow_json::reader::{infer_json_schema_from_iterator, ReaderBuilder};
use arrow_json::writer::LineDelimited;
use arrow_json::WriterBuilder;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde_json::{Map, Value};
use sourcesense_utils::error::Error;
use sourcesense_utils::{SourceSenseResult, StagedBatches};
use tracing::{debug, info};

use crate::transforms::flatten::FlatRecord;

pub const PARQUET_EXTENSION: &str = "parquet";

/// Result of one `write_stage` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageWrite {
    pub record_count: usize,
    pub chunk_count: usize,
    pub files: Vec<PathBuf>,
}

/// Replace `dir` with a fresh, empty directory.
pub fn clear_dir(dir: &Path) -> SourceSenseResult<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Infer a Parquet-storable schema from the records.
pub fn infer_schema(records: &[FlatRecord]) -> SourceSenseResult<SchemaRef> {
    let inferred = infer_json_schema_from_iterator(
        records.iter().map(|r| Ok(Value::Object(r.fields().clone()))),
    )?;
    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), storable(f.data_type()), true))
        .collect();
    Ok(Arc::new(Schema::new(fields)))
}

fn storable(data_type: &DataType) -> DataType {
    match data_type {
        DataType::Null => DataType::Utf8,
        DataType::List(item) => {
            DataType::List(Arc::new(Field::new(item.name(), storable(item.data_type()), true)))
        }
        other => other.clone(),
    }
}

/// Encode records into one record batch per `chunk_size` rows.
pub fn encode(records: &[FlatRecord], chunk_size: usize) -> SourceSenseResult<StagedBatches> {
    if records.is_empty() {
        return Ok(StagedBatches::new(Vec::new()));
    }
    let chunk_size = chunk_size.max(1);
    let schema = infer_schema(records)?;
    let mut decoder = ReaderBuilder::new(schema)
        .with_batch_size(chunk_size)
        .with_coerce_primitive(true)
        .build_decoder()?;

    let mut batches = Vec::with_capacity(records.len().div_ceil(chunk_size));
    for chunk in records.chunks(chunk_size) {
        decoder.serialize(chunk)?;
        if let Some(batch) = decoder.flush()? {
            batches.push(batch);
        }
    }
    Ok(StagedBatches::new(batches))
}

/// Stage records as Parquet under `dir`, one file per chunk.
///
/// `dir` is cleared first so it never mixes runs. Empty input leaves an
/// empty directory and reports zero records.
pub fn write_stage(records: &[FlatRecord], dir: impl AsRef<Path>, chunk_size: usize) -> SourceSenseResult<StageWrite> {
    let dir = dir.as_ref();
    clear_dir(dir)?;

    let staged = encode(records, chunk_size)?;
    if staged.is_empty() {
        debug!(dir = %dir.display(), "nothing to stage");
        return Ok(StageWrite::default());
    }

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut files = Vec::with_capacity(staged.batches().len());
    for (n, batch) in staged.batches().iter().enumerate() {
        let path = dir.join(format!("chunk-{n}.{PARQUET_EXTENSION}"));
        let file = File::create(&path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props.clone()))?;
        writer.write(batch)?;
        writer.close()?;
        files.push(path);
    }

    info!(
        dir = %dir.display(),
        records = staged.num_rows(),
        chunks = files.len(),
        "staged dataset written"
    );
    Ok(StageWrite {
        record_count: staged.num_rows(),
        chunk_count: files.len(),
        files,
    })
}

/// Parquet files under `dir`, in chunk order.
pub fn staged_files(dir: impl AsRef<Path>) -> SourceSenseResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == PARQUET_EXTENSION))
        .collect();
    files.sort_by_key(|p| chunk_index(p));
    Ok(files)
}

fn chunk_index(path: &Path) -> (usize, PathBuf) {
    let n = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix("chunk-"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(usize::MAX);
    (n, path.to_path_buf())
}

/// Read every staged row back. Missing columns come back as explicit nulls.
pub fn read_stage(dir: impl AsRef<Path>) -> SourceSenseResult<Vec<FlatRecord>> {
    let dir = dir.as_ref();
    let files = staged_files(dir)?;
    if files.is_empty() {
        return Err(Error::NotFound(format!("no staged dataset at {}", dir.display())));
    }

    let mut records = Vec::new();
    for path in &files {
        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?.build()?;
        let mut writer = WriterBuilder::new()
            .with_explicit_nulls(true)
            .build::<_, LineDelimited>(Vec::new());
        for batch in reader {
            writer.write(&batch?)?;
        }
        writer.finish()?;
        let buf = writer.into_inner();

        for row in serde_json::Deserializer::from_slice(&buf).into_iter::<Map<String, Value>>() {
            records.push(FlatRecord::from_flat(row?));
        }
    }

    debug!(dir = %dir.display(), files = files.len(), records = records.len(), "staged dataset read");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> FlatRecord {
        FlatRecord::from_flat(value.as_object().unwrap().clone())
    }

    fn sample() -> Vec<FlatRecord> {
        vec![
            record(json!({
                "id": 1296269,
                "name": "Hello-World",
                "full_name": "octocat/Hello-World",
                "owner_login": "octocat",
                "private": false,
                "stargazers_count": 80,
                "topics": ["octocat", "api"],
                "description": null
            })),
            record(json!({
                "id": 1296270,
                "name": "Spoon-Knife",
                "full_name": "octocat/Spoon-Knife",
                "owner_login": null,
                "private": true,
                "topics": [],
                "language": "HTML"
            })),
            record(json!({
                "id": 1296271,
                "name": "linguist",
                "full_name": "octocat/linguist",
                "stargazers_count": 3
            })),
        ]
    }

    fn sorted(mut records: Vec<FlatRecord>) -> Vec<FlatRecord> {
        records.sort_by(|a, b| a.get_str("full_name").cmp(&b.get_str("full_name")));
        records
    }

    #[test]
    fn write_then_read_returns_same_records() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample();

        let written = write_stage(&input, dir.path(), 2).unwrap();
        assert_eq!(written.record_count, 3);
        assert_eq!(written.chunk_count, 2);
        assert!(written.files.iter().all(|f| f.exists()));

        let output = read_stage(dir.path()).unwrap();
        assert_eq!(sorted(output), sorted(input));
    }

    #[test]
    fn read_back_fills_missing_columns_with_nulls() {
        let dir = tempfile::tempdir().unwrap();
        write_stage(&sample(), dir.path(), 100).unwrap();

        let rows = read_stage(dir.path()).unwrap();
        let linguist = rows
            .iter()
            .find(|r| r.get_str("name") == Some("linguist"))
            .unwrap();
        assert!(linguist.contains_key("language"));
        assert_eq!(linguist.get("language"), &Value::Null);
        assert_eq!(linguist.get("stargazers_count"), &json!(3));
    }

    #[test]
    fn rewrite_clears_previous_chunks() {
        let dir = tempfile::tempdir().unwrap();
        write_stage(&sample(), dir.path(), 1).unwrap();
        assert_eq!(staged_files(dir.path()).unwrap().len(), 3);

        let one = vec![sample().remove(0)];
        write_stage(&one, dir.path(), 1).unwrap();
        assert_eq!(staged_files(dir.path()).unwrap().len(), 1);
        assert_eq!(read_stage(dir.path()).unwrap(), one);
    }

    #[test]
    fn empty_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_stage(&[], dir.path().join("raw"), 10).unwrap();
        assert_eq!(written, StageWrite::default());
        assert!(staged_files(dir.path().join("raw")).unwrap().is_empty());
    }

    #[test]
    fn reading_missing_stage_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_stage(dir.path().join("nothing-here")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn all_null_columns_are_storable() {
        let records = vec![record(json!({"full_name": "a/b", "license_spdx_id": null}))];
        let schema = infer_schema(&records).unwrap();
        let field = schema.field_with_name("license_spdx_id").unwrap();
        assert_eq!(field.data_type(), &DataType::Utf8);
    }
}
