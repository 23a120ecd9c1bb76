//! CLI module
//!
//! Command-line interface for running the pipeline.
//!
//! # Commands
//!
//! - `run` - Load the selected resources into the sink
//! - `validate` - Resolve the configuration only
//! - `resources` - List the resource registry
//! - `state` - Print (or reset) stored cursors

mod commands;
mod runner;

pub use commands::{Cli, Commands, ConfigArgs, OutputFormat};
pub use runner::{exit_code_for, Runner, EXIT_CONFIG_ERROR};
