// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # pokechess-pipeline
//!
//! Incremental extraction of the PokeAPI catalog and the Chess.com public
//! player API into an analytical warehouse.
//!
//! ## Features
//!
//! - **Resource registry**: nine named resources with declared row schemas
//! - **Three iteration strategies**: flat listing pages, per-entity, per-entity-month
//! - **Resumable**: cursors are checkpointed after every accepted batch
//! - **Idempotent loads**: keyed resources merge, key-less resources append
//! - **Sinks**: in-memory, DuckDB, Parquet
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pokechess_pipeline::config::{ConfigResolver, RawConfig};
//! use pokechess_pipeline::pipeline::PipelineRunner;
//! use pokechess_pipeline::sink::{self, SinkKind};
//!
//! #[tokio::main]
//! async fn main() -> pokechess_pipeline::Result<()> {
//!     let raw = RawConfig::from_yaml("resources: [berries, types]\nentity_limit: 40")?;
//!     let context = ConfigResolver::default().resolve(&raw)?;
//!
//!     let sink = sink::open(SinkKind::Duckdb, Some("warehouse.duckdb".into()))?;
//!     let report = PipelineRunner::new(context, sink)?.run().await;
//!
//!     std::process::exit(report.exit_code());
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  config: RawConfig layers → ConfigResolver → ExecutionContext   │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┴─────────────────────────────────┐
//! │  pipeline: PipelineRunner → RunReport                           │
//! │  per resource: resume_point → ResourceIterator → accept → checkpoint
//! └──────────┬───────────┬───────────────┬───────────┬──────────────┘
//!            │           │               │           │
//! ┌──────────┴┬──────────┴┬──────────────┴┬──────────┴┬─────────────┐
//! │ resource  │   http    │  pagination   │   state   │    sink     │
//! ├───────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ pokemon   │ Retry     │ Offset pages  │ Cursor    │ Memory      │
//! │ chess     │ 429 wait  │ partition:    │ Tracker   │ DuckDB      │
//! │ schema    │ Rate Limit│  entities,    │ Manager   │ Parquet     │
//! │ template  │ Backoff   │  months       │           │ (output)    │
//! └───────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the pipeline
pub mod error;

/// Common types and type aliases
pub mod types;

/// HTTP client with retry and rate limiting
pub mod http;

/// Endpoint template interpolation
pub mod template;

/// Declared row schemas
pub mod schema;

/// Resource descriptors and registry
pub mod resource;

/// Listing page pagination
pub mod pagination;

/// Entity and month partition routing
pub mod partition;

/// Cursors, state storage and checkpointing
pub mod state;

/// Per-resource iteration engine
pub mod engine;

/// Arrow/Parquet output
pub mod output;

/// Warehouse sinks
pub mod sink;

/// Configuration layers and resolution
pub mod config;

/// Pipeline runner and run reports
pub mod pipeline;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, ErrorCategory, Result};
pub use types::*;

// Re-export commonly used types
pub use config::{ConfigResolver, ExecutionContext, RawConfig};
pub use pipeline::{PipelineRunner, ResourceReport, ResourceStatus, RunReport};
pub use resource::{ResourceDescriptor, ResourceRegistry};
pub use sink::{Sink, SinkKind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
