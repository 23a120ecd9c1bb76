//! Pagination module
//!
//! Offset/limit pagination over listing endpoints.
//!
//! # Overview
//!
//! Flat-paginated resources walk a listing (`results` + `next`) page by
//! page. The paginator decides the `offset`/`limit` of each request,
//! applies the entity limit and detects the last page.

mod strategies;
mod types;

pub use strategies::OffsetPaginator;
pub use types::{ListingPage, NextPage, PageRequest, PaginationState};

#[cfg(test)]
mod tests;
