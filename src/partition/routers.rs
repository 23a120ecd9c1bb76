//! Partition router implementations
//!
//! Each router handles a specific partitioning strategy.

use super::types::{Partition, PartitionRouter};
use crate::state::Cursor;
use crate::types::YearMonth;

// ============================================================================
// List Router
// ============================================================================

/// Entity list router
///
/// One partition per configured entity, in configured order. Entities the
/// resume cursor records as completed are skipped.
#[derive(Debug, Clone)]
pub struct ListRouter {
    entities: Vec<String>,
    resume: Option<Cursor>,
}

impl ListRouter {
    /// Create a new list router
    pub fn new(entities: Vec<String>) -> Self {
        Self {
            entities,
            resume: None,
        }
    }

    /// Skip entities completed in the given cursor
    #[must_use]
    pub fn resume_from(mut self, cursor: Option<&Cursor>) -> Self {
        self.resume = cursor.cloned();
        self
    }

    fn is_completed(&self, entity: &str) -> bool {
        self.resume
            .as_ref()
            .is_some_and(|c| c.is_entity_completed(entity))
    }
}

impl PartitionRouter for ListRouter {
    fn partitions(&self) -> Vec<Partition> {
        self.entities
            .iter()
            .filter(|e| !self.is_completed(e))
            .map(Partition::entity)
            .collect()
    }

    fn skipped(&self) -> usize {
        self.entities.iter().filter(|e| self.is_completed(e)).count()
    }
}

// ============================================================================
// Month Window Router
// ============================================================================

/// Entity × month router
///
/// For each entity (configured order) the months from `start` to `end`
/// inclusive, ascending. An entity resumes after its last completed month.
#[derive(Debug, Clone)]
pub struct MonthWindowRouter {
    entities: Vec<String>,
    start: YearMonth,
    end: YearMonth,
    resume: Option<Cursor>,
}

impl MonthWindowRouter {
    /// Create a new month window router
    pub fn new(entities: Vec<String>, start: YearMonth, end: YearMonth) -> Self {
        Self {
            entities,
            start,
            end,
            resume: None,
        }
    }

    /// Skip months completed in the given cursor
    #[must_use]
    pub fn resume_from(mut self, cursor: Option<&Cursor>) -> Self {
        self.resume = cursor.cloned();
        self
    }

    fn first_month(&self, entity: &str) -> YearMonth {
        match self.resume.as_ref().and_then(|c| c.last_window(entity)) {
            Some(last) if last >= self.start => last.succ(),
            _ => self.start,
        }
    }
}

impl PartitionRouter for MonthWindowRouter {
    fn partitions(&self) -> Vec<Partition> {
        self.entities
            .iter()
            .flat_map(|entity| {
                self.first_month(entity)
                    .through(self.end)
                    .into_iter()
                    .map(move |month| Partition::month(entity.as_str(), month))
            })
            .collect()
    }

    fn skipped(&self) -> usize {
        let total = self.start.through(self.end).len() * self.entities.len();
        total - self.partitions().len()
    }
}
