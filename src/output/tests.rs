//! Tests for output module

use super::*;
use crate::schema::{FieldDef, FieldType, TableSchema};
use crate::types::Row;
use arrow::datatypes::DataType;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

const FIELDS: &[FieldDef] = &[
    FieldDef::required("id", FieldType::Integer),
    FieldDef::required("name", FieldType::String),
    FieldDef::optional("weight", FieldType::Float),
    FieldDef::optional("is_default", FieldType::Boolean),
    FieldDef::optional("types", FieldType::StringList),
    FieldDef::optional("stats", FieldType::Json),
];

const SCHEMA: TableSchema = TableSchema::new(FIELDS);

fn row(value: serde_json::Value) -> Row {
    SCHEMA
        .normalize(value.as_object().cloned().unwrap())
        .unwrap()
}

fn sample_rows() -> Vec<Row> {
    vec![
        row(json!({
            "id": 1,
            "name": "bulbasaur",
            "weight": 6.9,
            "is_default": true,
            "types": ["grass", "poison"],
            "stats": {"hp": 45, "attack": 49},
        })),
        row(json!({"id": 4, "name": "charmander"})),
    ]
}

// ============================================================================
// Conversion Tests
// ============================================================================

#[test]
fn test_rows_to_batch_layout() {
    let batch = rows_to_batch(&sample_rows(), &SCHEMA).unwrap();

    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.num_columns(), FIELDS.len());

    let schema = batch.schema();
    assert_eq!(schema.field(0).data_type(), &DataType::Int64);
    assert!(!schema.field(0).is_nullable());
    assert_eq!(schema.field_with_name("stats").unwrap().data_type(), &DataType::Utf8);
    assert!(matches!(
        schema.field_with_name("types").unwrap().data_type(),
        DataType::List(_)
    ));
}

#[test]
fn test_rows_to_batch_empty() {
    let batch = rows_to_batch(&[], &SCHEMA).unwrap();
    assert_eq!(batch.num_rows(), 0);
    assert_eq!(batch.num_columns(), FIELDS.len());
}

#[test]
fn test_batch_to_rows_restores_values() {
    let rows = sample_rows();
    let batch = rows_to_batch(&rows, &SCHEMA).unwrap();

    let restored = batch_to_rows(&batch, &SCHEMA).unwrap();
    assert_eq!(restored, rows);
}

#[test]
fn test_null_list_stays_null() {
    let batch = rows_to_batch(&sample_rows(), &SCHEMA).unwrap();
    let restored = batch_to_rows(&batch, &SCHEMA).unwrap();

    assert_eq!(restored[1]["types"], json!(null));
    assert_eq!(restored[1]["stats"], json!(null));
}

#[test]
fn test_empty_list_is_not_null() {
    let rows = vec![row(json!({"id": 7, "name": "squirtle", "types": []}))];
    let batch = rows_to_batch(&rows, &SCHEMA).unwrap();

    let restored = batch_to_rows(&batch, &SCHEMA).unwrap();
    assert_eq!(restored[0]["types"], json!([]));
}

// ============================================================================
// Writer Tests
// ============================================================================

#[test]
fn test_parquet_writer_config_default() {
    let config = ParquetWriterConfig::default();
    assert_eq!(config.row_group_size(), 1024 * 1024);
}

#[test]
fn test_parquet_writer_config_builder() {
    let config = ParquetWriterConfig::new().with_row_group_size(500).zstd();
    assert_eq!(config.row_group_size(), 500);
}

#[test]
fn test_write_parquet_atomic_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pokemon_data").join("pokemon_details").join("offset_00000000.parquet");

    let batch = rows_to_batch(&sample_rows(), &SCHEMA).unwrap();
    let written = write_parquet_atomic(&path, &batch, None).unwrap();

    assert_eq!(written, 2);
    assert!(path.exists());
    assert!(!path.with_file_name("offset_00000000.parquet.tmp").exists());

    let batches = read_parquet(&path).unwrap();
    let rows: Vec<Row> = batches
        .iter()
        .flat_map(|b| batch_to_rows(b, &SCHEMA).unwrap())
        .collect();
    assert_eq!(rows, sample_rows());
}

#[test]
fn test_write_parquet_atomic_replaces_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("unit.parquet");

    let batch = rows_to_batch(&sample_rows(), &SCHEMA).unwrap();
    write_parquet_atomic(&path, &batch, None).unwrap();

    let single = rows_to_batch(&sample_rows()[..1], &SCHEMA).unwrap();
    write_parquet_atomic(&path, &single, Some(&ParquetWriterConfig::new().uncompressed()))
        .unwrap();

    let total: usize = read_parquet(&path).unwrap().iter().map(|b| b.num_rows()).sum();
    assert_eq!(total, 1);
}

#[test]
fn test_parquet_writer_rows_written() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rows.parquet");
    let batch = rows_to_batch(&sample_rows(), &SCHEMA).unwrap();

    let mut writer =
        ParquetWriter::new(&path, batch.schema().as_ref(), &ParquetWriterConfig::default()).unwrap();
    writer.write(&batch).unwrap();
    writer.write(&batch).unwrap();

    assert_eq!(writer.rows_written(), 4);
    assert_eq!(writer.close().unwrap(), 4);
}

#[test]
fn test_read_missing_file() {
    let dir = tempdir().unwrap();
    assert!(read_parquet(dir.path().join("nope.parquet")).is_err());
}
