//! Incremental state tracker
//!
//! Reads resume points from the sink and writes checkpoints back through
//! it, refusing any checkpoint that would move a cursor backwards.

use super::types::Cursor;
use crate::error::{Error, Result};
use crate::sink::Sink;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Cursor bookkeeping for one dataset
pub struct StateTracker {
    sink: Arc<dyn Sink>,
    dataset: String,
    /// Last cursor read or written per resource
    last: Mutex<HashMap<String, Cursor>>,
}

impl StateTracker {
    /// Create a tracker persisting through `sink`
    pub fn new(sink: Arc<dyn Sink>, dataset: impl Into<String>) -> Self {
        Self {
            sink,
            dataset: dataset.into(),
            last: Mutex::new(HashMap::new()),
        }
    }

    /// Dataset the cursors belong to
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Last durable cursor of a resource, if any
    pub async fn resume_point(&self, resource: &str) -> Result<Option<Cursor>> {
        let cursor = self.sink.load_cursor(&self.dataset, resource).await?;

        let mut last = self.last.lock().await;
        match &cursor {
            Some(c) => {
                debug!(resource, cursor = %c, "Resuming from stored cursor");
                last.insert(resource.to_string(), c.clone());
            }
            None => {
                last.remove(resource);
            }
        }

        Ok(cursor)
    }

    /// Durably record `cursor` for `resource`
    ///
    /// Must only be called after the batch the cursor follows has been
    /// accepted by the sink. Fails with [`Error::CursorRegression`] when
    /// the cursor does not cover the previous one.
    pub async fn checkpoint(&self, resource: &str, cursor: &Cursor) -> Result<()> {
        let mut last = self.last.lock().await;

        if let Some(previous) = last.get(resource) {
            if !cursor.covers(previous) {
                return Err(Error::CursorRegression {
                    resource: resource.to_string(),
                    message: format!("{cursor} does not cover {previous}"),
                });
            }
        }

        self.sink
            .save_cursor(&self.dataset, resource, cursor)
            .await?;
        debug!(resource, cursor = %cursor, "Checkpoint saved");
        last.insert(resource.to_string(), cursor.clone());

        Ok(())
    }
}

impl std::fmt::Debug for StateTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateTracker")
            .field("sink", &self.sink.name())
            .field("dataset", &self.dataset)
            .finish_non_exhaustive()
    }
}
