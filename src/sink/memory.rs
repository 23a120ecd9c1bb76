//! In-memory sink

use super::{dedupe_by_key, key_string, Sink};
use crate::engine::RowBatch;
use crate::error::{Error, Result};
use crate::resource::TableSpec;
use crate::state::{Cursor, StateManager};
use crate::types::Row;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

/// Sink keeping tables and cursors in process memory
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Rows per `(dataset, table)`
    tables: Mutex<HashMap<(String, String), Vec<Row>>>,
    /// Cursor store per dataset
    states: Mutex<HashMap<String, StateManager>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows currently stored in a table
    pub async fn rows(&self, dataset: &str, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .await
            .get(&(dataset.to_string(), table.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Whether a table was prepared
    pub async fn has_table(&self, dataset: &str, table: &str) -> bool {
        self.tables
            .lock()
            .await
            .contains_key(&(dataset.to_string(), table.to_string()))
    }

    async fn state(&self, dataset: &str) -> StateManager {
        self.states
            .lock()
            .await
            .entry(dataset.to_string())
            .or_insert_with(StateManager::in_memory)
            .clone()
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn prepare(&self, table: &TableSpec) -> Result<()> {
        self.tables
            .lock()
            .await
            .entry((table.dataset.clone(), table.name.to_string()))
            .or_default();
        Ok(())
    }

    async fn accept(&self, table: &TableSpec, batch: &RowBatch) -> Result<usize> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .get_mut(&(table.dataset.clone(), table.name.to_string()))
            .ok_or_else(|| {
                Error::sink(format!(
                    "Table {}.{} has not been prepared",
                    table.dataset, table.name
                ))
            })?;

        let rows = dedupe_by_key(table, batch.rows());
        if table.is_keyed() {
            let incoming: HashSet<String> = rows.iter().map(|r| key_string(table, r)).collect();
            stored.retain(|r| !incoming.contains(&key_string(table, r)));
        }
        stored.extend(rows.iter().map(|r| (*r).clone()));

        Ok(rows.len())
    }

    async fn load_cursor(&self, dataset: &str, resource: &str) -> Result<Option<Cursor>> {
        Ok(self.state(dataset).await.get_cursor(resource).await)
    }

    async fn save_cursor(&self, dataset: &str, resource: &str, cursor: &Cursor) -> Result<()> {
        self.state(dataset)
            .await
            .set_cursor(resource, cursor.clone())
            .await
    }

    async fn clear_cursor(&self, dataset: &str, resource: &str) -> Result<bool> {
        self.state(dataset).await.clear_cursor(resource).await
    }

    async fn cursors(&self, dataset: &str) -> Result<BTreeMap<String, Cursor>> {
        Ok(self.state(dataset).await.snapshot().await.resources)
    }
}
