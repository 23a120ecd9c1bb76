//! Resource definitions
//!
//! A resource is a named, statically declared data stream: where it comes
//! from, how it is iterated, how raw API JSON becomes rows and which fields
//! identify a row.
//!
//! # Registry
//!
//! | Resource | Source | Strategy |
//! |---|---|---|
//! | `pokemon_details`, `berries`, `abilities`, `moves`, `types` | pokemon | flat-paginated |
//! | `players_profiles`, `players_online_status`, `players_archives` | chess | per-entity |
//! | `players_games` | chess | date-windowed |
//!
//! Names are resolved through [`ResourceRegistry`]; hyphenated spellings
//! and the `players_games_archive` alias are accepted.

pub mod chess;
mod fields;
pub mod pokemon;

use crate::error::{Error, Result};
use crate::schema::TableSchema;
use crate::types::{JsonObject, JsonValue, Row, Source, WriteDisposition, YearMonth};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

/// How a resource turns into requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Offset/limit listing pages, then one detail request per listed item
    FlatPaginated {
        /// Listing endpoint (`offset`/`limit` query parameters)
        list_endpoint: &'static str,
        /// Detail endpoint template, rendered with `name`
        detail_endpoint: &'static str,
        /// Items per listing page
        page_size: u32,
    },
    /// One request per configured entity, rendered with `entity`
    PerEntity {
        /// Endpoint template
        endpoint: &'static str,
    },
    /// One request per entity and month, rendered with `entity`, `year`, `month`
    DateWindowed {
        /// Endpoint template
        endpoint: &'static str,
    },
}

impl Strategy {
    /// Short name, as listed by the CLI
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FlatPaginated { .. } => "flat_paginated",
            Self::PerEntity { .. } => "per_entity",
            Self::DateWindowed { .. } => "date_windowed",
        }
    }

    /// Whether this strategy iterates configured entities
    pub fn needs_entities(&self) -> bool {
        !matches!(self, Self::FlatPaginated { .. })
    }

    /// Endpoint templates used by this strategy
    pub fn endpoints(&self) -> Vec<&'static str> {
        match self {
            Self::FlatPaginated {
                list_endpoint,
                detail_endpoint,
                ..
            } => vec![*list_endpoint, *detail_endpoint],
            Self::PerEntity { endpoint } | Self::DateWindowed { endpoint } => vec![*endpoint],
        }
    }
}

/// What a mapper knows about the unit that produced a response
#[derive(Debug, Clone)]
pub struct MapContext {
    /// Entity being processed (per-entity and date-windowed resources)
    pub entity: Option<String>,
    /// Month being processed (date-windowed resources)
    pub month: Option<YearMonth>,
    /// Time the run started
    pub checked_at: DateTime<Utc>,
}

impl MapContext {
    /// Context for a unit without entity or month
    pub fn new(checked_at: DateTime<Utc>) -> Self {
        Self {
            entity: None,
            month: None,
            checked_at,
        }
    }

    /// Set the entity
    #[must_use]
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Set the month
    #[must_use]
    pub fn with_month(mut self, month: YearMonth) -> Self {
        self.month = Some(month);
        self
    }

    fn entity_value(&self) -> JsonValue {
        self.entity.as_deref().map_or(JsonValue::Null, JsonValue::from)
    }
}

/// Raw API JSON to unnormalized records
pub type RowMapper = fn(&JsonValue, &MapContext) -> Result<Vec<JsonObject>>;

/// Static declaration of one resource
#[derive(Debug)]
pub struct ResourceDescriptor {
    /// Unique resource (and table) name
    pub name: &'static str,
    /// Source API
    pub source: Source,
    /// One-line description
    pub description: &'static str,
    /// Iteration strategy
    pub strategy: Strategy,
    /// Declared row shape
    pub schema: TableSchema,
    /// Uniqueness key; empty for append-only resources
    pub primary_key: &'static [&'static str],
    /// Row mapping function
    pub mapper: RowMapper,
}

impl ResourceDescriptor {
    /// Append for key-less resources, merge otherwise
    pub fn write_disposition(&self) -> WriteDisposition {
        if self.primary_key.is_empty() {
            WriteDisposition::Append
        } else {
            WriteDisposition::Merge
        }
    }

    /// Map a response body and normalize every record to the schema
    pub fn map_rows(&self, body: &JsonValue, ctx: &MapContext) -> Result<Vec<Row>> {
        (self.mapper)(body, ctx)?
            .into_iter()
            .map(|record| self.schema.normalize(record))
            .collect()
    }

    /// Destination table in the given dataset
    pub fn table(&self, dataset: impl Into<String>) -> TableSpec {
        TableSpec {
            dataset: dataset.into(),
            name: self.name,
            schema: self.schema,
            primary_key: self.primary_key,
        }
    }

    /// JSON description, as listed by the CLI
    pub fn describe(&self) -> JsonValue {
        json!({
            "name": self.name,
            "source": self.source,
            "strategy": self.strategy.kind(),
            "endpoints": self.strategy.endpoints(),
            "primary_key": self.primary_key,
            "write_disposition": self.write_disposition(),
            "description": self.description,
            "fields": self.schema.describe(),
        })
    }
}

/// A sink destination: dataset, table name, layout and key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSpec {
    /// Target dataset (schema / directory)
    pub dataset: String,
    /// Table name (the resource name)
    pub name: &'static str,
    /// Column layout
    #[serde(skip)]
    pub schema: TableSchema,
    /// Uniqueness key; empty means append-only
    pub primary_key: &'static [&'static str],
}

impl TableSpec {
    /// Whether rows are merged on the key
    pub fn is_keyed(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Values of the uniqueness key for a row
    pub fn key_of(&self, row: &Row) -> Vec<JsonValue> {
        self.primary_key
            .iter()
            .map(|k| row.get(*k).cloned().unwrap_or(JsonValue::Null))
            .collect()
    }
}

// ============================================================================
// Registry
// ============================================================================

static RESOURCES: &[&ResourceDescriptor] = &[
    &pokemon::POKEMON_DETAILS,
    &pokemon::BERRIES,
    &pokemon::ABILITIES,
    &pokemon::MOVES,
    &pokemon::TYPES,
    &chess::PLAYERS_PROFILES,
    &chess::PLAYERS_GAMES,
    &chess::PLAYERS_ONLINE_STATUS,
    &chess::PLAYERS_ARCHIVES,
];

static ALIASES: &[(&str, &str)] = &[("players_games_archive", "players_games")];

/// Lookup of resource descriptors by name
#[derive(Debug, Clone, Copy)]
pub struct ResourceRegistry {
    resources: &'static [&'static ResourceDescriptor],
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ResourceRegistry {
    /// Registry of the built-in Pokemon and Chess.com resources
    pub fn builtin() -> Self {
        Self {
            resources: RESOURCES,
        }
    }

    /// All descriptors, in registry order
    pub fn all(&self) -> &'static [&'static ResourceDescriptor] {
        self.resources
    }

    /// Canonical names, in registry order
    pub fn names(&self) -> Vec<&'static str> {
        self.resources.iter().map(|r| r.name).collect()
    }

    /// Resolve a name, accepting hyphens, mixed case and aliases
    pub fn get(&self, name: &str) -> Result<&'static ResourceDescriptor> {
        let canonical = canonical_name(name);
        let canonical = ALIASES
            .iter()
            .find(|(alias, _)| *alias == canonical)
            .map_or(canonical.as_str(), |(_, target)| target);

        self.resources
            .iter()
            .copied()
            .find(|r| r.name == canonical)
            .ok_or_else(|| Error::UnknownResource {
                name: name.to_string(),
                known: self.names().join(", "),
            })
    }

    /// Descriptors of one source
    pub fn by_source(&self, source: Source) -> Vec<&'static ResourceDescriptor> {
        self.resources
            .iter()
            .copied()
            .filter(|r| r.source == source)
            .collect()
    }
}

/// Lowercase, trimmed, hyphens as underscores
pub fn canonical_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('-', "_")
}
