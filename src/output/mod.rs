//! Output module
//!
//! Handles Arrow RecordBatch creation and Parquet file writing.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Converting normalized rows to Arrow RecordBatches by declared schema
//! - Converting RecordBatches back to rows
//! - Writing Parquet files atomically and reading them back

mod schema;
mod writer;

pub use schema::{batch_to_rows, rows_to_batch};
pub use writer::{read_parquet, write_parquet_atomic, ParquetWriter, ParquetWriterConfig};

#[cfg(test)]
mod tests;
