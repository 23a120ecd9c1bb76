//! Sink module
//!
//! Destinations for row batches and the cursors that follow them.
//!
//! # Overview
//!
//! - [`MemorySink`] - in-process tables, used for dry runs and tests
//! - [`DuckDbSink`] - the analytical warehouse: one schema per dataset
//! - [`ParquetSink`] - one Parquet file per unit under `<root>/<dataset>/<resource>/`
//!
//! Keyed tables merge: rows replace existing rows with the same key.
//! Tables without a key append.

mod duckdb_sink;
mod memory;
mod parquet_sink;

pub use duckdb_sink::DuckDbSink;
pub use memory::MemorySink;
pub use parquet_sink::ParquetSink;

use crate::engine::RowBatch;
use crate::error::{Error, Result};
use crate::resource::TableSpec;
use crate::state::Cursor;
use crate::types::Row;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

/// A warehouse-loading collaborator
///
/// Implementations serialize their own writes, so one sink can be shared
/// by resources loading concurrently.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short name, for logs
    fn name(&self) -> &'static str;

    /// Create the destination table if needed (idempotent)
    async fn prepare(&self, table: &TableSpec) -> Result<()>;

    /// Store a batch, returning the number of rows written
    async fn accept(&self, table: &TableSpec, batch: &RowBatch) -> Result<usize>;

    /// Stored cursor of a resource
    async fn load_cursor(&self, dataset: &str, resource: &str) -> Result<Option<Cursor>>;

    /// Durably store the cursor of a resource
    async fn save_cursor(&self, dataset: &str, resource: &str, cursor: &Cursor) -> Result<()>;

    /// Forget the cursor of a resource; `true` if one was stored
    async fn clear_cursor(&self, dataset: &str, resource: &str) -> Result<bool>;

    /// All stored cursors of a dataset
    async fn cursors(&self, dataset: &str) -> Result<BTreeMap<String, Cursor>>;
}

/// Which sink to load into
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// In-process tables, nothing persisted
    #[default]
    Memory,
    /// DuckDB database file
    Duckdb,
    /// Parquet files
    Parquet,
}

impl SinkKind {
    /// Destination used when none is given
    pub fn default_destination(self) -> Option<PathBuf> {
        match self {
            Self::Memory => None,
            Self::Duckdb => Some(PathBuf::from("pipeline.duckdb")),
            Self::Parquet => Some(PathBuf::from("output")),
        }
    }
}

/// Open a sink of the given kind
pub fn open(kind: SinkKind, destination: Option<PathBuf>) -> Result<Arc<dyn Sink>> {
    let destination = destination.or_else(|| kind.default_destination());

    let sink: Arc<dyn Sink> = match (kind, destination) {
        (SinkKind::Memory, _) => Arc::new(MemorySink::new()),
        (SinkKind::Duckdb, Some(path)) => Arc::new(DuckDbSink::open(path)?),
        (SinkKind::Parquet, Some(root)) => Arc::new(ParquetSink::new(root)),
        (kind, None) => {
            return Err(Error::config(format!("Sink {kind:?} needs a destination")));
        }
    };
    Ok(sink)
}

/// Rows of a batch with duplicate keys collapsed, keeping the last one
///
/// Append-only tables keep every row.
pub(crate) fn dedupe_by_key<'a>(table: &TableSpec, rows: &'a [Row]) -> Vec<&'a Row> {
    if !table.is_keyed() {
        return rows.iter().collect();
    }

    let mut last: HashMap<String, usize> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        last.insert(key_string(table, row), i);
    }

    rows.iter()
        .enumerate()
        .filter(|(i, row)| last.get(&key_string(table, row)) == Some(i))
        .map(|(_, row)| row)
        .collect()
}

/// Comparable rendering of a row's key
pub(crate) fn key_string(table: &TableSpec, row: &Row) -> String {
    serde_json::Value::Array(table.key_of(row)).to_string()
}
