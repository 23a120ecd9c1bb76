//! Offset pagination
//!
//! The PokeAPI listings take `?offset=..&limit=..` and report the next
//! page URL (or null) in the body.

use super::types::{ListingPage, NextPage, PageRequest, PaginationState};

/// Offset-based pagination with a fixed page size and an optional cap
///
/// Requests always end on a multiple of the page size, so a run resumed
/// from an unaligned offset first fetches the remainder of its page and
/// then continues on the regular stride. The cap truncates the final
/// request so no item past it is ever listed.
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    /// Number of items per page
    pub page_size: u64,
    /// Absolute offset past which nothing is fetched
    pub max_items: Option<u64>,
}

impl OffsetPaginator {
    /// Create a new offset paginator
    pub fn new(page_size: u32, max_items: Option<u64>) -> Self {
        Self {
            page_size: u64::from(page_size.max(1)),
            max_items,
        }
    }

    /// The next listing request, or `None` when pagination is over
    pub fn next_request(&self, state: &PaginationState) -> Option<PageRequest> {
        if state.done {
            return None;
        }

        let offset = state.offset;
        let to_boundary = self.page_size - offset % self.page_size;
        let limit = match self.max_items {
            Some(max) if offset >= max => return None,
            Some(max) => to_boundary.min(max - offset),
            None => to_boundary,
        };

        Some(PageRequest { offset, limit })
    }

    /// Record a consumed page and decide whether another follows
    pub fn process_page(
        &self,
        request: &PageRequest,
        page: &ListingPage,
        state: &mut PaginationState,
    ) -> NextPage {
        let consumed = page.names.len() as u64;
        state.offset = request.offset + consumed;
        state.total_fetched += consumed;

        let capped = self.max_items.is_some_and(|max| state.offset >= max);
        if consumed == 0 || !page.has_more || capped {
            state.mark_done();
            return NextPage::Done;
        }

        NextPage::Continue {
            offset: state.offset,
        }
    }
}
