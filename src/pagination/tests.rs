//! Tests for pagination module

use super::*;
use crate::error::ErrorCategory;
use serde_json::json;
use test_case::test_case;

fn listing(names: &[&str], next: Option<&str>) -> ListingPage {
    ListingPage::from_json(&json!({
        "count": 1302,
        "next": next,
        "results": names
            .iter()
            .map(|n| json!({"name": n, "url": format!("https://pokeapi.co/api/v2/pokemon/{n}/")}))
            .collect::<Vec<_>>()
    }))
    .unwrap()
}

// ============================================================================
// ListingPage
// ============================================================================

#[test]
fn test_listing_page_decodes() {
    let page = listing(&["bulbasaur", "ivysaur"], Some("https://pokeapi.co/api/v2/pokemon?offset=2&limit=2"));

    assert_eq!(page.names, vec!["bulbasaur", "ivysaur"]);
    assert!(page.has_more);
    assert_eq!(page.count, Some(1302));
}

#[test]
fn test_listing_page_last() {
    let page = listing(&["venusaur"], None);
    assert!(!page.has_more);
}

#[test]
fn test_listing_page_missing_results() {
    let err = ListingPage::from_json(&json!({"count": 0})).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Mapping);
}

#[test]
fn test_listing_page_item_without_name() {
    let err = ListingPage::from_json(&json!({"results": [{"url": "x"}]})).unwrap_err();
    assert!(err.to_string().contains("results[0].name"));
}

#[test]
fn test_listing_page_truncate() {
    let mut page = listing(&["a", "b", "c"], Some("next"));
    page.truncate(2);
    assert_eq!(page.names, vec!["a", "b"]);
}

// ============================================================================
// OffsetPaginator
// ============================================================================

#[test_case(0, None, Some((0, 20)) ; "first page")]
#[test_case(40, None, Some((40, 20)) ; "aligned resume")]
#[test_case(25, None, Some((25, 15)) ; "unaligned resume realigns")]
#[test_case(0, Some(5), Some((0, 5)) ; "cap smaller than page")]
#[test_case(20, Some(30), Some((20, 10)) ; "cap truncates final page")]
#[test_case(30, Some(30), None ; "cap reached")]
#[test_case(50, Some(30), None ; "past cap")]
fn test_next_request(offset: u64, max: Option<u64>, expected: Option<(u64, u64)>) {
    let paginator = OffsetPaginator::new(20, max);
    let state = PaginationState::starting_at(offset);

    let request = paginator
        .next_request(&state)
        .map(|r| (r.offset, r.limit));
    assert_eq!(request, expected);
}

#[test]
fn test_process_page_continues() {
    let paginator = OffsetPaginator::new(2, None);
    let mut state = PaginationState::default();
    let request = paginator.next_request(&state).unwrap();

    let next = paginator.process_page(&request, &listing(&["a", "b"], Some("more")), &mut state);

    assert_eq!(next, NextPage::Continue { offset: 2 });
    assert_eq!(state.total_fetched, 2);
    assert_eq!(paginator.next_request(&state).unwrap().offset, 2);
}

#[test]
fn test_process_page_stops_without_next() {
    let paginator = OffsetPaginator::new(2, None);
    let mut state = PaginationState::default();
    let request = paginator.next_request(&state).unwrap();

    let next = paginator.process_page(&request, &listing(&["a"], None), &mut state);

    assert!(next.is_done());
    assert_eq!(state.offset, 1);
    assert!(paginator.next_request(&state).is_none());
}

#[test]
fn test_process_page_stops_on_empty_page() {
    let paginator = OffsetPaginator::new(2, None);
    let mut state = PaginationState::starting_at(10);
    let request = paginator.next_request(&state).unwrap();

    let next = paginator.process_page(&request, &listing(&[], Some("more")), &mut state);

    assert!(next.is_done());
    assert_eq!(state.offset, 10);
}

#[test]
fn test_process_page_stops_at_cap() {
    let paginator = OffsetPaginator::new(20, Some(25));
    let mut state = PaginationState::starting_at(20);
    let request = paginator.next_request(&state).unwrap();
    assert_eq!(request.limit, 5);

    let mut page = listing(&["a", "b", "c", "d", "e", "f"], Some("more"));
    page.truncate(request.limit);
    let next = paginator.process_page(&request, &page, &mut state);

    assert!(next.is_done());
    assert_eq!(state.offset, 25);
}

#[test]
fn test_zero_page_size_is_clamped() {
    let paginator = OffsetPaginator::new(0, None);
    assert_eq!(paginator.page_size, 1);
}

#[test]
fn test_page_request_query() {
    let request = PageRequest {
        offset: 40,
        limit: 20,
    };
    assert_eq!(request.query(), [("offset", 40), ("limit", 20)]);
}
