//! Partition types and traits
//!
//! Defines the core partition abstractions.

use crate::resource::MapContext;
use crate::template::TemplateContext;
use crate::types::YearMonth;
use chrono::{DateTime, Utc};
use std::fmt;

/// One slice of an entity-driven resource: an entity, or an entity-month
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Entity (player username)
    pub entity: String,
    /// Month, for date-windowed resources
    pub month: Option<YearMonth>,
}

impl Partition {
    /// Partition covering a whole entity
    pub fn entity(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            month: None,
        }
    }

    /// Partition covering one month of an entity
    pub fn month(entity: impl Into<String>, month: YearMonth) -> Self {
        Self {
            entity: entity.into(),
            month: Some(month),
        }
    }

    /// Stable identifier, e.g. `hikaru` or `hikaru/2024/01`
    pub fn id(&self) -> String {
        self.to_string()
    }

    /// Variables for rendering the endpoint template
    pub fn template_context(&self) -> TemplateContext {
        let ctx = TemplateContext::new().with("entity", self.entity.as_str());
        match self.month {
            Some(month) => ctx
                .with("year", month.year().to_string())
                .with("month", month.month_padded()),
            None => ctx,
        }
    }

    /// Mapping context for rows produced by this partition
    pub fn map_context(&self, checked_at: DateTime<Utc>) -> MapContext {
        let ctx = MapContext::new(checked_at).with_entity(self.entity.as_str());
        match self.month {
            Some(month) => ctx.with_month(month),
            None => ctx,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.month {
            Some(month) => write!(f, "{}/{month}", self.entity),
            None => f.write_str(&self.entity),
        }
    }
}

/// Trait for partition routers
///
/// Routers produce the remaining partitions of a resource in iteration
/// order, with work already covered by the resume cursor left out.
pub trait PartitionRouter: Send + Sync {
    /// Partitions still to process
    fn partitions(&self) -> Vec<Partition>;

    /// Partitions skipped because the resume cursor covers them
    fn skipped(&self) -> usize;
}
