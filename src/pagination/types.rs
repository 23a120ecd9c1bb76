//! Pagination types
//!
//! Defines the listing page shape and the offset bookkeeping used by the
//! flat-paginated resources.

use crate::error::{Error, Result};
use serde_json::Value;

/// Query window of one listing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// `offset` query parameter
    pub offset: u64,
    /// `limit` query parameter
    pub limit: u64,
}

impl PageRequest {
    /// Query parameters for the listing endpoint
    pub fn query(&self) -> [(&'static str, u64); 2] {
        [("offset", self.offset), ("limit", self.limit)]
    }
}

/// Result of processing a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages may follow, starting at this offset
    Continue {
        /// Offset of the next unconsumed item
        offset: u64,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// A decoded listing page: `{"count", "next", "results": [{"name", "url"}]}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    /// Names of the listed items, in listing order
    pub names: Vec<String>,
    /// Whether the API reports a further page
    pub has_more: bool,
    /// Total items reported by the API
    pub count: Option<u64>,
}

impl ListingPage {
    /// Decode a listing response body
    pub fn from_json(body: &Value) -> Result<Self> {
        let results = body
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::mapping("results", "expected a listing with a results array"))?;

        let names = results
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.get("name")
                    .and_then(Value::as_str)
                    .map(ToString::to_string)
                    .ok_or_else(|| Error::mapping(format!("results[{i}].name"), "expected a string"))
            })
            .collect::<Result<Vec<_>>>()?;

        let has_more = match body.get("next") {
            None | Some(Value::Null) => false,
            Some(Value::String(next)) => !next.is_empty(),
            Some(_) => return Err(Error::mapping("next", "expected a URL or null")),
        };

        Ok(Self {
            names,
            has_more,
            count: body.get("count").and_then(Value::as_u64),
        })
    }

    /// Keep at most `limit` items
    pub fn truncate(&mut self, limit: u64) {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        self.names.truncate(limit);
    }
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Offset of the next unconsumed item
    pub offset: u64,
    /// Items consumed during this run
    pub total_fetched: u64,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// State resuming at `offset`
    pub fn starting_at(offset: u64) -> Self {
        Self {
            offset,
            ..Default::default()
        }
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }
}
