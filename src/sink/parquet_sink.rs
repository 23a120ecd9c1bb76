//! Parquet sink
//!
//! Layout: `<root>/<dataset>/<resource>/<unit>.parquet`, cursors in
//! `<root>/<dataset>/_state.json`.
//!
//! Keyed resources write one file per unit and overwrite it when the unit
//! is processed again. Keys arriving in a batch are removed from every other
//! file of the table first, so a key lives in exactly one file. Append-only
//! resources write a new timestamped file per batch.

use super::{dedupe_by_key, key_string, Sink};
use crate::engine::RowBatch;
use crate::error::{Result, ResultExt};
use crate::output::{batch_to_rows, read_parquet, rows_to_batch, write_parquet_atomic, ParquetWriterConfig};
use crate::resource::TableSpec;
use crate::state::{Cursor, StateManager};
use crate::types::Row;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

const STATE_FILE: &str = "_state.json";

/// Sink writing Parquet files under a root directory
#[derive(Debug)]
pub struct ParquetSink {
    root: PathBuf,
    config: ParquetWriterConfig,
    states: Mutex<HashMap<String, StateManager>>,
    /// Serializes merges touching several files of one table
    writes: Mutex<()>,
    /// Disambiguates append files written within the same instant
    sequence: AtomicU64,
}

impl ParquetSink {
    /// Create a sink rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config: ParquetWriterConfig::default(),
            states: Mutex::new(HashMap::new()),
            writes: Mutex::new(()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Use a custom writer configuration
    #[must_use]
    pub fn with_config(mut self, config: ParquetWriterConfig) -> Self {
        self.config = config;
        self
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a table's files
    pub fn table_dir(&self, table: &TableSpec) -> PathBuf {
        self.root.join(&table.dataset).join(table.name)
    }

    /// All rows of a table, reading files in name order
    pub fn read_table(&self, table: &TableSpec) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        for file in self.files(table)? {
            rows.extend(self.read_file(table, &file)?);
        }
        Ok(rows)
    }

    /// Parquet files of a table, in name order
    fn files(&self, table: &TableSpec) -> Result<Vec<PathBuf>> {
        let dir = self.table_dir(table);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)
            .with_context(|| format!("Cannot list {}", dir.display()))?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "parquet"))
            .collect();
        files.sort();
        Ok(files)
    }

    fn read_file(&self, table: &TableSpec, file: &Path) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        for batch in read_parquet(file)? {
            rows.extend(batch_to_rows(&batch, &table.schema)?);
        }
        Ok(rows)
    }

    /// Drop `keys` from every table file except `keep`
    fn evict_keys(&self, table: &TableSpec, keys: &HashSet<String>, keep: &Path) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        for file in self.files(table)? {
            if file.as_path() == keep {
                continue;
            }

            let rows = self.read_file(table, &file)?;
            let remaining: Vec<Row> = rows
                .iter()
                .filter(|row| !keys.contains(&key_string(table, row)))
                .cloned()
                .collect();
            if remaining.len() == rows.len() {
                continue;
            }

            debug!(
                path = %file.display(),
                evicted = rows.len() - remaining.len(),
                "Rewriting Parquet file without merged keys"
            );
            let record_batch = rows_to_batch(&remaining, &table.schema)?;
            write_parquet_atomic(&file, &record_batch, Some(&self.config))?;
        }
        Ok(())
    }

    fn file_for(&self, table: &TableSpec, batch: &RowBatch) -> PathBuf {
        let slug = batch.unit().slug();
        let name = if table.is_keyed() {
            format!("{slug}.parquet")
        } else {
            let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
            format!("{slug}_{}_{seq}.parquet", Utc::now().format("%Y%m%dT%H%M%S%6f"))
        };
        self.table_dir(table).join(name)
    }

    async fn state(&self, dataset: &str) -> Result<StateManager> {
        let mut states = self.states.lock().await;
        if let Some(manager) = states.get(dataset) {
            return Ok(manager.clone());
        }

        let manager = StateManager::from_file(self.root.join(dataset).join(STATE_FILE))?;
        states.insert(dataset.to_string(), manager.clone());
        Ok(manager)
    }
}

#[async_trait]
impl Sink for ParquetSink {
    fn name(&self) -> &'static str {
        "parquet"
    }

    async fn prepare(&self, table: &TableSpec) -> Result<()> {
        let dir = self.table_dir(table);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Cannot create {}", dir.display()))
    }

    async fn accept(&self, table: &TableSpec, batch: &RowBatch) -> Result<usize> {
        let rows: Vec<Row> = dedupe_by_key(table, batch.rows())
            .into_iter()
            .cloned()
            .collect();
        if rows.is_empty() && !table.is_keyed() {
            return Ok(0);
        }

        let _guard = self.writes.lock().await;
        let path = self.file_for(table, batch);
        if table.is_keyed() {
            let keys: HashSet<String> = rows.iter().map(|row| key_string(table, row)).collect();
            self.evict_keys(table, &keys, &path)?;
        }

        let record_batch = rows_to_batch(&rows, &table.schema)?;
        let written = write_parquet_atomic(&path, &record_batch, Some(&self.config))?;

        debug!(path = %path.display(), rows = written, "Parquet file written");
        Ok(written)
    }

    async fn load_cursor(&self, dataset: &str, resource: &str) -> Result<Option<Cursor>> {
        Ok(self.state(dataset).await?.get_cursor(resource).await)
    }

    async fn save_cursor(&self, dataset: &str, resource: &str, cursor: &Cursor) -> Result<()> {
        self.state(dataset)
            .await?
            .set_cursor(resource, cursor.clone())
            .await
    }

    async fn clear_cursor(&self, dataset: &str, resource: &str) -> Result<bool> {
        self.state(dataset).await?.clear_cursor(resource).await
    }

    async fn cursors(&self, dataset: &str) -> Result<BTreeMap<String, Cursor>> {
        Ok(self.state(dataset).await?.snapshot().await.resources)
    }
}
