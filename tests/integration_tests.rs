//! Integration tests using mock HTTP servers
//!
//! Tests the full flow: raw config → resolver → pipeline runner → sink,
//! across reruns of the same execution context.

use chrono::{TimeZone, Utc};
use pokechess_pipeline::config::{ConfigResolver, ExecutionContext, RawConfig};
use pokechess_pipeline::error::ErrorCategory;
use pokechess_pipeline::pipeline::{PipelineRunner, ResourceStatus};
use pokechess_pipeline::sink::{MemorySink, Sink};
use pokechess_pipeline::state::Cursor;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolve(server: &MockServer, yaml: &str) -> ExecutionContext {
    let base = RawConfig {
        pokemon_base_url: Some(server.uri()),
        chess_base_url: Some(server.uri()),
        requests_per_second: Some("1000".into()),
        ..RawConfig::default()
    };
    ConfigResolver::default()
        .with_now(Utc.with_ymd_and_hms(2024, 6, 15, 8, 0, 0).unwrap())
        .resolve(&base.merge(RawConfig::from_yaml(yaml).unwrap()))
        .unwrap()
}

fn listing(names: &[&str], next: bool) -> Value {
    json!({
        "count": 1000,
        "next": if next { json!("next-page") } else { Value::Null },
        "results": names.iter().map(|n| json!({"name": n, "url": ""})).collect::<Vec<_>>(),
    })
}

async fn mount_type(server: &MockServer, name: &str, id: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/type/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "name": name,
            "generation": {"name": "generation-i"},
            "damage_relations": {"double_damage_to": [{"name": "grass"}]},
            "pokemon": [{"pokemon": {"name": "charmander"}}],
        })))
        .mount(server)
        .await;
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_resolver_rejects_unknown_resources_and_bad_limits() {
    let resolver = ConfigResolver::default();

    let err = resolver
        .resolve(&RawConfig::from_yaml("resources: [berries, pokestops]").unwrap())
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);

    for limit in ["0", "-1"] {
        let raw = RawConfig::from_yaml(&format!("resources: [berries]\nentity_limit: {limit}")).unwrap();
        assert!(resolver.resolve(&raw).unwrap_err().is_configuration());
    }
}

// ============================================================================
// Flat pagination
// ============================================================================

#[tokio::test]
async fn test_entity_limit_emits_exactly_min_of_limit_and_available() {
    let server = MockServer::start().await;
    let names: Vec<String> = (1..=25).map(|i| format!("t{i}")).collect();
    let first: Vec<&str> = names[..20].iter().map(String::as_str).collect();

    Mock::given(method("GET"))
        .and(path("/type"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(&first, true)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/type"))
        .and(query_param("offset", "20"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["t21", "t22", "t23", "t24"], true)))
        .expect(1)
        .mount(&server)
        .await;
    for (i, name) in names.iter().enumerate() {
        mount_type(&server, name, i as u64 + 1).await;
    }

    let sink = Arc::new(MemorySink::new());
    let ctx = resolve(&server, "resources: [types]\nentity_limit: 23");
    let report = PipelineRunner::new(ctx, sink.clone()).unwrap().run().await;

    assert!(report.succeeded());
    assert_eq!(report.resources[0].rows_loaded, 23);
    assert_eq!(report.resources[0].units_processed, 2);
    assert_eq!(sink.rows("pokemon_data", "types").await.len(), 23);

    let requested = server.received_requests().await.unwrap();
    assert!(!requested.iter().any(|r| r.url.path() == "/type/t24"));
}

#[tokio::test]
async fn test_listing_exhausted_before_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/type"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["normal", "fire"], false)))
        .expect(1)
        .mount(&server)
        .await;
    mount_type(&server, "normal", 1).await;
    mount_type(&server, "fire", 10).await;

    let sink = Arc::new(MemorySink::new());
    let ctx = resolve(&server, "resources: [types]\nentity_limit: 50");
    let report = PipelineRunner::new(ctx, sink.clone()).unwrap().run().await;

    assert_eq!(report.resources[0].rows_loaded, 2);
    let rows = sink.rows("pokemon_data", "types").await;
    assert_eq!(rows[1]["damage_relations"]["double_damage_to"], json!(["grass"]));
    assert_eq!(rows[1]["pokemon"], json!(["charmander"]));
}

// ============================================================================
// Date windows and idempotence
// ============================================================================

#[tokio::test]
async fn test_windowed_months_ascending_and_idempotent_rerun() {
    let server = MockServer::start().await;
    for (month, games) in [("01", 1), ("02", 0), ("03", 2)] {
        let games: Vec<Value> = (0..games)
            .map(|i| json!({"url": format!("https://www.chess.com/game/live/{month}{i}")}))
            .collect();
        let response = if month == "02" {
            ResponseTemplate::new(404)
        } else {
            ResponseTemplate::new(200).set_body_json(json!({"games": games}))
        };
        Mock::given(method("GET"))
            .and(path(format!("/player/hikaru/games/2024/{month}")))
            .respond_with(response)
            .expect(1)
            .mount(&server)
            .await;
    }

    let sink = Arc::new(MemorySink::new());
    let ctx = resolve(
        &server,
        "resources: players-games\nentities: Hikaru\nstart_period: 2024/01\nend_period: 2024/03",
    );

    let first = PipelineRunner::new(ctx.clone(), sink.clone()).unwrap().run().await;
    assert!(first.succeeded());
    assert_eq!(first.resources[0].units_processed, 3);
    assert_eq!(first.resources[0].rows_loaded, 3);

    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(
        requested,
        vec![
            "/player/hikaru/games/2024/01",
            "/player/hikaru/games/2024/02",
            "/player/hikaru/games/2024/03",
        ]
    );

    let cursor = sink.load_cursor("chess_data", "players_games").await.unwrap();

    let second = PipelineRunner::new(ctx, sink.clone()).unwrap().run().await;
    assert!(second.succeeded());
    assert_eq!(second.resources[0].units_processed, 0);
    assert_eq!(
        sink.load_cursor("chess_data", "players_games").await.unwrap(),
        cursor
    );
    assert_eq!(sink.rows("chess_data", "players_games").await.len(), 3);
}

// ============================================================================
// Failure isolation and resume
// ============================================================================

#[tokio::test]
async fn test_failing_resource_is_isolated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/type"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/player/e1/games/archives"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "archives": ["https://api.chess.com/pub/player/e1/games/2024/01"]
        })))
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let ctx = resolve(&server, "resources: [types, players_archives]\nentities: [e1]");
    let report = PipelineRunner::new(ctx, sink.clone()).unwrap().run().await;

    let types = report.resource("types").unwrap();
    assert_eq!(types.status, ResourceStatus::Failed);
    assert_eq!(types.first_error.as_ref().unwrap().category, ErrorCategory::Mapping);

    let archives = report.resource("players_archives").unwrap();
    assert_eq!(archives.status, ResourceStatus::Success);
    let rows = sink.rows("api_data", "players_archives").await;
    assert_eq!(rows[0]["year"], json!(2024));
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_resume_processes_only_remaining_entities() {
    let server = MockServer::start().await;
    for (entity, id) in [("e1", 1), ("e2", 2)] {
        Mock::given(method("GET"))
            .and(path(format!("/player/{entity}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"player_id": id})))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/player/e3"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/player/e3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"player_id": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let ctx = resolve(
        &server,
        "resources: [players_profiles]\nentities: e1,e2,e3\nmax_attempts: 1",
    );

    let first = PipelineRunner::new(ctx.clone(), sink.clone()).unwrap().run().await;
    assert_eq!(first.resources[0].status, ResourceStatus::Partial);

    let second = PipelineRunner::new(ctx, sink.clone()).unwrap().run().await;
    assert!(second.succeeded());
    assert_eq!(second.resources[0].units_processed, 1);

    let cursor = sink
        .load_cursor("chess_data", "players_profiles")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cursor, Cursor::no_entities().with_entity("e1").with_entity("e2").with_entity("e3"));
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_429_with_retry_after_waits_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/player/e1/is-online"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/player/e1/is-online"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"online": true})))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let ctx = resolve(&server, "resources: [players_online_status]\nentities: [e1]");

    let started = Instant::now();
    let report = PipelineRunner::new(ctx, sink.clone()).unwrap().run().await;

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(report.succeeded());
    assert!(report.resources[0].first_error.is_none());
    let rows = sink.rows("chess_data", "players_online_status").await;
    assert_eq!(rows[0]["online"], json!(true));
    assert_eq!(rows[0]["checked_at"], json!("2024-06-15T08:00:00+00:00"));
}
