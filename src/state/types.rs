//! Cursor and state types
//!
//! These types are serialized to JSON and persisted between runs by the
//! sinks.

use crate::types::YearMonth;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Resumable position within a resource's iteration
///
/// Serialized with a `kind` tag:
/// `{"kind":"page","offset":40}`,
/// `{"kind":"entities","completed":["a","b"]}`,
/// `{"kind":"windows","completed":{"a":"2024/02"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cursor {
    /// Records consumed from a flat listing
    Page {
        /// Listing offset of the next unconsumed record
        offset: u64,
    },
    /// Entities fully processed
    Entities {
        /// Completed entity names
        completed: BTreeSet<String>,
    },
    /// Latest fully processed month per entity
    Windows {
        /// Entity name to last completed month
        completed: BTreeMap<String, YearMonth>,
    },
}

impl Cursor {
    /// Cursor at the given listing offset
    pub fn page(offset: u64) -> Self {
        Self::Page { offset }
    }

    /// Cursor with no completed entities
    pub fn no_entities() -> Self {
        Self::Entities {
            completed: BTreeSet::new(),
        }
    }

    /// Cursor with no completed windows
    pub fn no_windows() -> Self {
        Self::Windows {
            completed: BTreeMap::new(),
        }
    }

    /// Shape name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Page { .. } => "page",
            Self::Entities { .. } => "entities",
            Self::Windows { .. } => "windows",
        }
    }

    /// Whether this cursor is at or past `previous`
    ///
    /// Cursors of different shapes never cover each other.
    pub fn covers(&self, previous: &Cursor) -> bool {
        match (self, previous) {
            (Self::Page { offset: a }, Self::Page { offset: b }) => a >= b,
            (Self::Entities { completed: a }, Self::Entities { completed: b }) => b.is_subset(a),
            (Self::Windows { completed: a }, Self::Windows { completed: b }) => b
                .iter()
                .all(|(entity, month)| a.get(entity).is_some_and(|m| m >= month)),
            _ => false,
        }
    }

    /// Listing offset, for page cursors
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::Page { offset } => Some(*offset),
            _ => None,
        }
    }

    /// Whether an entity is recorded as completed
    pub fn is_entity_completed(&self, entity: &str) -> bool {
        match self {
            Self::Entities { completed } => completed.contains(entity),
            _ => false,
        }
    }

    /// Last completed month for an entity
    pub fn last_window(&self, entity: &str) -> Option<YearMonth> {
        match self {
            Self::Windows { completed } => completed.get(entity).copied(),
            _ => None,
        }
    }

    /// This cursor with one more completed entity
    #[must_use]
    pub fn with_entity(&self, entity: &str) -> Self {
        let mut completed = match self {
            Self::Entities { completed } => completed.clone(),
            _ => BTreeSet::new(),
        };
        completed.insert(entity.to_string());
        Self::Entities { completed }
    }

    /// This cursor with `month` completed for `entity`
    ///
    /// Never moves an entity's window backwards.
    #[must_use]
    pub fn with_window(&self, entity: &str, month: YearMonth) -> Self {
        let mut completed = match self {
            Self::Windows { completed } => completed.clone(),
            _ => BTreeMap::new(),
        };
        completed
            .entry(entity.to_string())
            .and_modify(|m| *m = (*m).max(month))
            .or_insert(month);
        Self::Windows { completed }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page { offset } => write!(f, "page(offset={offset})"),
            Self::Entities { completed } => write!(f, "entities({} completed)", completed.len()),
            Self::Windows { completed } => {
                let parts: Vec<String> = completed.iter().map(|(e, m)| format!("{e}@{m}")).collect();
                write!(f, "windows({})", parts.join(", "))
            }
        }
    }
}

/// All cursors of one dataset, keyed by resource name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Per-resource cursor
    #[serde(default)]
    pub resources: BTreeMap<String, Cursor>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cursor of a resource
    pub fn get_cursor(&self, resource: &str) -> Option<&Cursor> {
        self.resources.get(resource)
    }

    /// Set the cursor of a resource
    pub fn set_cursor(&mut self, resource: &str, cursor: Cursor) {
        self.resources.insert(resource.to_string(), cursor);
    }

    /// Remove the cursor of a resource
    pub fn clear_cursor(&mut self, resource: &str) -> Option<Cursor> {
        self.resources.remove(resource)
    }
}
