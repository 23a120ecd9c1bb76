//! Run report types

use crate::engine::UnitFailure;
use crate::error::{Error, ErrorCategory};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Terminal status of one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// Every unit was loaded
    Success,
    /// Some units were committed, some failed
    Partial,
    /// Nothing was committed
    Failed,
}

impl ResourceStatus {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error as it appears in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedError {
    /// Error category
    pub category: ErrorCategory,
    /// Rendered message
    pub message: String,
}

impl From<&Error> for ReportedError {
    fn from(error: &Error) -> Self {
        Self {
            category: error.category(),
            message: error.to_string(),
        }
    }
}

impl From<&UnitFailure> for ReportedError {
    fn from(failure: &UnitFailure) -> Self {
        Self {
            category: failure.error.category(),
            message: failure.to_string(),
        }
    }
}

impl fmt::Display for ReportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// Outcome of one resource
#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    /// Resource name
    pub resource: String,
    /// Terminal status
    pub status: ResourceStatus,
    /// Rows accepted by the sink
    pub rows_loaded: usize,
    /// Units accepted by the sink
    pub units_processed: usize,
    /// Units that failed, including one stopped by a fatal error
    pub units_failed: usize,
    /// First error encountered
    pub first_error: Option<ReportedError>,
    /// Wall time
    pub duration_ms: u64,
    #[serde(skip)]
    fatal: bool,
}

impl ResourceReport {
    /// Empty report for a resource about to start
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            status: ResourceStatus::Success,
            rows_loaded: 0,
            units_processed: 0,
            units_failed: 0,
            first_error: None,
            duration_ms: 0,
            fatal: false,
        }
    }

    /// Record a batch accepted by the sink
    pub fn record_batch(&mut self, rows: usize) {
        self.units_processed += 1;
        self.rows_loaded += rows;
    }

    /// Record a unit that failed without stopping the resource
    pub fn record_failure(&mut self, failure: &UnitFailure) {
        self.units_failed += 1;
        self.first_error.get_or_insert_with(|| failure.into());
    }

    /// Record the error that stopped the resource
    pub fn record_fatal(&mut self, error: &Error) {
        self.units_failed += 1;
        self.fatal = true;
        self.first_error.get_or_insert_with(|| error.into());
    }

    /// Settle the status and duration
    #[must_use]
    pub fn finish(mut self, elapsed: Duration) -> Self {
        self.duration_ms = elapsed.as_millis() as u64;
        self.status = match (self.units_failed, self.units_processed) {
            (0, _) if !self.fatal => ResourceStatus::Success,
            (_, 0) => ResourceStatus::Failed,
            _ => ResourceStatus::Partial,
        };
        self
    }

    /// Whether the resource fully succeeded
    pub fn succeeded(&self) -> bool {
        self.status == ResourceStatus::Success
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Dataset loaded into
    pub dataset: String,
    /// Sink name
    pub sink: &'static str,
    /// Per-resource outcomes, in selection order
    pub resources: Vec<ResourceReport>,
    /// Wall time
    pub duration_ms: u64,
}

impl RunReport {
    /// Whether every resource succeeded
    pub fn succeeded(&self) -> bool {
        self.resources.iter().all(ResourceReport::succeeded)
    }

    /// Process exit code: 0 when every resource succeeded, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.succeeded())
    }

    /// First error of the first resource that did not succeed
    pub fn first_error(&self) -> Option<(&str, &ReportedError)> {
        self.resources
            .iter()
            .filter(|r| !r.succeeded())
            .find_map(|r| r.first_error.as_ref().map(|e| (r.resource.as_str(), e)))
    }

    /// Rows loaded across resources
    pub fn total_rows(&self) -> usize {
        self.resources.iter().map(|r| r.rows_loaded).sum()
    }

    /// Report of one resource
    pub fn resource(&self, name: &str) -> Option<&ResourceReport> {
        self.resources.iter().find(|r| r.resource == name)
    }
}
