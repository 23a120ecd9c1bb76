//! Partition routing module
//!
//! Supports: entity lists, entity × month windows
//!
//! # Overview
//!
//! Per-entity and date-windowed resources split into partitions, one unit
//! of work each. Routers honor the resume cursor so a rerun only visits
//! the partitions that were not checkpointed.

mod routers;
mod types;

pub use routers::{ListRouter, MonthWindowRouter};
pub use types::{Partition, PartitionRouter};

#[cfg(test)]
mod tests;
