//! State management module
//!
//! Handles cursor tracking, checkpointing, and resumability.
//! Cursors are persisted by the sink between runs to enable incremental
//! loads.
//!
//! # Overview
//!
//! The state module provides:
//! - `Cursor` - Resumable position within a resource (page, entities, windows)
//! - `StateManager` - In-memory or file-based cursor storage used by sinks
//! - `StateTracker` - Resume points and regression-checked checkpoints

mod manager;
mod tracker;
mod types;

pub use manager::StateManager;
pub use tracker::StateTracker;
pub use types::{Cursor, State};
