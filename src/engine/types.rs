//! Engine types
//!
//! Units of work, row batches and the scope of one iteration.

use crate::error::Error;
use crate::state::Cursor;
use crate::types::{Row, YearMonth};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// One iteration step: a listing page, an entity or an entity-month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Unit {
    /// A listing page and the details of its items
    Page {
        /// Listing offset
        offset: u64,
        /// Items requested
        limit: u64,
    },
    /// One entity
    Entity {
        /// Entity name
        entity: String,
    },
    /// One month of one entity
    Month {
        /// Entity name
        entity: String,
        /// Month
        month: YearMonth,
    },
}

impl Unit {
    /// Entity of the unit, if any
    pub fn entity(&self) -> Option<&str> {
        match self {
            Self::Page { .. } => None,
            Self::Entity { entity } | Self::Month { entity, .. } => Some(entity),
        }
    }

    /// File-system safe identifier, stable across runs
    pub fn slug(&self) -> String {
        match self {
            Self::Page { offset, .. } => format!("offset_{offset:08}"),
            Self::Entity { entity } => entity.clone(),
            Self::Month { entity, month } => {
                format!("{entity}_{:04}_{}", month.year(), month.month_padded())
            }
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page { offset, limit } => write!(f, "page[offset={offset}, limit={limit}]"),
            Self::Entity { entity } => write!(f, "entity {entity}"),
            Self::Month { entity, month } => write!(f, "{entity} {month}"),
        }
    }
}

/// Normalized rows produced by one unit
///
/// `cursor` is the position to checkpoint once the batch is accepted; it
/// is `None` for units that must be revisited by the next run.
#[derive(Debug, Clone)]
pub struct RowBatch {
    resource: String,
    unit: Unit,
    rows: Vec<Row>,
    cursor: Option<Cursor>,
}

impl RowBatch {
    /// Create a batch
    pub fn new(
        resource: impl Into<String>,
        unit: Unit,
        rows: Vec<Row>,
        cursor: Option<Cursor>,
    ) -> Self {
        Self {
            resource: resource.into(),
            unit,
            rows,
            cursor,
        }
    }

    /// Resource that produced the batch
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Unit that produced the batch
    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// Rows, in API order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Cursor to checkpoint after acceptance
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the batch has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A unit that could not be turned into a batch
#[derive(Debug)]
pub struct UnitFailure {
    /// Failed unit
    pub unit: Unit,
    /// Cause
    pub error: Error,
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.unit, self.error)
    }
}

/// What one iteration covers
#[derive(Debug, Clone)]
pub struct IterationScope {
    /// Entities, in processing order
    pub entities: Vec<String>,
    /// Absolute cap on listed items for flat-paginated resources
    pub entity_limit: Option<u64>,
    /// First month, inclusive
    pub start: YearMonth,
    /// Last month, inclusive
    pub end: YearMonth,
    /// Current month; windows from here on are not checkpointed
    pub reference_month: YearMonth,
    /// Run timestamp, stamped on time-dependent rows
    pub checked_at: DateTime<Utc>,
}

impl IterationScope {
    /// Scope with no entities covering only the current month
    pub fn new(checked_at: DateTime<Utc>) -> Self {
        let month = YearMonth::from_date(checked_at.date_naive());
        Self {
            entities: Vec::new(),
            entity_limit: None,
            start: month,
            end: month,
            reference_month: month,
            checked_at,
        }
    }

    /// Set the entities
    #[must_use]
    pub fn with_entities(mut self, entities: Vec<String>) -> Self {
        self.entities = entities;
        self
    }

    /// Set the entity limit
    #[must_use]
    pub fn with_entity_limit(mut self, limit: Option<u64>) -> Self {
        self.entity_limit = limit;
        self
    }

    /// Set the month range
    #[must_use]
    pub fn with_months(mut self, start: YearMonth, end: YearMonth) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

/// Counters of one iteration
#[derive(Debug, Clone, Default)]
pub struct IterationStats {
    /// HTTP requests issued
    pub requests: usize,
    /// Units turned into batches
    pub units: usize,
    /// Rows emitted
    pub rows: usize,
    /// Units that failed
    pub failures: usize,
    /// Units skipped after an earlier failure of the same entity
    pub skipped: usize,
}

impl IterationStats {
    /// Record an emitted batch
    pub fn add_batch(&mut self, rows: usize) {
        self.units += 1;
        self.rows += rows;
    }

    /// Record a failed unit
    pub fn add_failure(&mut self) {
        self.failures += 1;
    }
}
