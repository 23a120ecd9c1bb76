//! Tests for partition module

use super::*;
use crate::state::Cursor;
use crate::types::YearMonth;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

fn ym(s: &str) -> YearMonth {
    s.parse().unwrap()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

fn ids(router: &dyn PartitionRouter) -> Vec<String> {
    router.partitions().iter().map(Partition::id).collect()
}

// ============================================================================
// Partition Tests
// ============================================================================

#[test]
fn test_partition_ids() {
    assert_eq!(Partition::entity("hikaru").id(), "hikaru");
    assert_eq!(Partition::month("hikaru", ym("2024/01")).id(), "hikaru/2024/01");
}

#[test]
fn test_partition_template_context() {
    let ctx = Partition::month("magnuscarlsen", ym("2023/09")).template_context();

    assert_eq!(ctx.get("entity"), Some(&json!("magnuscarlsen")));
    assert_eq!(ctx.get("year"), Some(&json!("2023")));
    assert_eq!(ctx.get("month"), Some(&json!("09")));
}

#[test]
fn test_partition_entity_context_has_no_month() {
    let ctx = Partition::entity("hikaru").template_context();
    assert!(ctx.get("month").is_none());
}

#[test]
fn test_partition_map_context() {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let ctx = Partition::month("hikaru", ym("2024/02")).map_context(at);

    assert_eq!(ctx.entity.as_deref(), Some("hikaru"));
    assert_eq!(ctx.month, Some(ym("2024/02")));
    assert_eq!(ctx.checked_at, at);
}

// ============================================================================
// ListRouter Tests
// ============================================================================

#[test]
fn test_list_router_keeps_order() {
    let router = ListRouter::new(names(&["e1", "e2", "e3"]));
    assert_eq!(ids(&router), vec!["e1", "e2", "e3"]);
    assert_eq!(router.skipped(), 0);
}

#[test]
fn test_list_router_skips_completed() {
    let cursor = Cursor::no_entities().with_entity("e1").with_entity("e2");
    let router = ListRouter::new(names(&["e1", "e2", "e3"])).resume_from(Some(&cursor));

    assert_eq!(ids(&router), vec!["e3"]);
    assert_eq!(router.skipped(), 2);
}

#[test]
fn test_list_router_empty() {
    let router = ListRouter::new(Vec::new());
    assert!(router.partitions().is_empty());
}

// ============================================================================
// MonthWindowRouter Tests
// ============================================================================

#[test]
fn test_month_router_ascending_per_entity() {
    let router = MonthWindowRouter::new(names(&["a", "b"]), ym("2023/12"), ym("2024/02"));

    assert_eq!(
        ids(&router),
        vec![
            "a/2023/12", "a/2024/01", "a/2024/02", "b/2023/12", "b/2024/01", "b/2024/02",
        ]
    );
}

#[test]
fn test_month_router_resumes_after_last_window() {
    let cursor = Cursor::no_windows().with_window("a", ym("2024/01"));
    let router = MonthWindowRouter::new(names(&["a", "b"]), ym("2024/01"), ym("2024/03"))
        .resume_from(Some(&cursor));

    assert_eq!(
        ids(&router),
        vec!["a/2024/02", "a/2024/03", "b/2024/01", "b/2024/02", "b/2024/03"]
    );
    assert_eq!(router.skipped(), 1);
}

#[test]
fn test_month_router_window_before_start_is_ignored() {
    let cursor = Cursor::no_windows().with_window("a", ym("2022/05"));
    let router = MonthWindowRouter::new(names(&["a"]), ym("2024/01"), ym("2024/02"))
        .resume_from(Some(&cursor));

    assert_eq!(ids(&router), vec!["a/2024/01", "a/2024/02"]);
}

#[test]
fn test_month_router_fully_covered() {
    let cursor = Cursor::no_windows().with_window("a", ym("2024/06"));
    let router = MonthWindowRouter::new(names(&["a"]), ym("2024/01"), ym("2024/03"))
        .resume_from(Some(&cursor));

    assert!(router.partitions().is_empty());
    assert_eq!(router.skipped(), 3);
}

#[test]
fn test_month_router_empty_range() {
    let router = MonthWindowRouter::new(names(&["a"]), ym("2024/03"), ym("2024/01"));
    assert!(router.partitions().is_empty());
}
