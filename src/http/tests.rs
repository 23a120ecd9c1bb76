//! Tests for the HTTP client module

use super::*;
use crate::error::{Error, ErrorCategory};
use crate::types::BackoffType;
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_builder(server: &MockServer) -> HttpClientConfigBuilder {
    HttpClientConfig::builder()
        .base_url(server.uri())
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .rate_limit_cooldown(Duration::from_millis(20))
        .no_rate_limit()
}

fn test_client(server: &MockServer) -> HttpClient {
    HttpClient::with_config(test_builder(server).build()).unwrap()
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_attempts, 3);
    assert_eq!(config.initial_backoff, Duration::from_millis(100));
    assert_eq!(config.max_backoff, Duration::from_secs(60));
    assert_eq!(config.rate_limit_cooldown, Duration::from_secs(5));
    assert!(config.base_url.is_none());
    assert_eq!(config.rate_limit.unwrap().requests_per_second, 10);
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("https://pokeapi.co/api/v2")
        .timeout(Duration::from_secs(60))
        .max_attempts(5)
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(200),
            Duration::from_secs(30),
        )
        .header("Accept", "application/json")
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(
        config.base_url,
        Some("https://pokeapi.co/api/v2".to_string())
    );
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.max_attempts, 5);
    assert_eq!(config.backoff_type, BackoffType::Linear);
    assert_eq!(config.initial_backoff, Duration::from_millis(200));
    assert_eq!(config.max_backoff, Duration::from_secs(30));
    assert_eq!(
        config.default_headers.get("Accept"),
        Some(&"application/json".to_string())
    );
    assert_eq!(config.user_agent, "test-agent/1.0");
}

#[test]
fn test_request_config_builder() {
    let config = RequestConfig::new().query("offset", 20).query("limit", 20);

    assert_eq!(
        config.query,
        vec![
            ("offset".to_string(), "20".to_string()),
            ("limit".to_string(), "20".to_string())
        ]
    );
}

// ============================================================================
// Successful Fetches
// ============================================================================

#[tokio::test]
async fn test_fetch_decodes_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/berry/cheri"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "name": "cheri"
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let response = client
        .fetch("/berry/cheri", RequestConfig::new())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body["name"], "cheri");
}

#[tokio::test]
async fn test_get_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/player/hikaru"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"player_id": 15448422})))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let data = client.get_json("player/hikaru").await.unwrap();

    assert_eq!(data["player_id"], 15448422);
}

#[tokio::test]
async fn test_fetch_query_params() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pokemon"))
        .and(query_param("offset", "40"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let response = client
        .fetch(
            "/pokemon",
            RequestConfig::new().query("offset", 40).query("limit", 20),
        )
        .await
        .unwrap();

    assert_eq!(response.body["results"], json!([]));
}

#[tokio::test]
async fn test_fetch_sends_default_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(mock_server.uri())
        .header("Accept", "application/json")
        .no_rate_limit()
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let response = client
        .fetch("/data", RequestConfig::new())
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_fetch_absolute_url_ignores_base() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pokemon/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 2})))
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url("http://unused.invalid")
        .no_rate_limit()
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let body = client
        .get_json(&format!("{}/pokemon/2", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(body["id"], 2);
}

// ============================================================================
// Error Classification
// ============================================================================

#[tokio::test]
async fn test_fetch_404_is_not_found_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/player/nobody"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.get_json("/player/nobody").await.unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(err.category(), ErrorCategory::NotFound);
}

#[tokio::test]
async fn test_fetch_400_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.get_json("/bad").await.unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 400, .. }));
}

#[tokio::test]
async fn test_fetch_non_json_body_is_mapping_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.get_json("/html").await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Mapping);
}

// ============================================================================
// Retries
// ============================================================================

#[tokio::test]
async fn test_fetch_retries_500_then_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let body = client.get_json("/flaky").await.unwrap();

    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_fetch_retries_any_5xx() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/unimplemented"))
        .respond_with(ResponseTemplate::new(501))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/unimplemented"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let body = client.get_json("/unimplemented").await.unwrap();

    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_fetch_gives_up_after_max_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/always-fail"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Server error"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.get_json("/always-fail").await.unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
    assert_eq!(err.category(), ErrorCategory::Network);
}

#[tokio::test]
async fn test_fetch_attempt_override() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/always-fail"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(test_builder(&mock_server).max_attempts(1).build()).unwrap();
    let result = client.get_json("/always-fail").await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_fetch_timeout_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = test_builder(&mock_server)
        .timeout(Duration::from_millis(50))
        .max_attempts(2)
        .build();
    let client = HttpClient::with_config(config).unwrap();
    let err = client.get_json("/slow").await.unwrap_err();

    assert!(matches!(err, Error::Timeout { timeout_ms: 50 }));
}

// ============================================================================
// Rate Limiting (429)
// ============================================================================

#[tokio::test]
async fn test_fetch_429_honors_retry_after_seconds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "1")
                .set_body_string("Rate limited"),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let start = Instant::now();
    let body = client.get_json("/limited").await.unwrap();

    assert_eq!(body["ok"], true);
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_fetch_429_without_hint_uses_cooldown() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let start = Instant::now();
    client.get_json("/limited").await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(20));
}

#[tokio::test]
async fn test_fetch_persistent_429_is_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.get_json("/limited").await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::RateLimited);
}

#[test]
fn test_parse_retry_after() {
    use super::client::parse_retry_after;

    assert_eq!(parse_retry_after("3"), Some(Duration::from_secs(3)));
    assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
    // dates in the past mean "retry now"
    assert_eq!(
        parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
        Some(Duration::ZERO)
    );
    let future = (chrono::Utc::now() + chrono::Duration::seconds(30)).to_rfc2822();
    let parsed = parse_retry_after(&future).unwrap();
    assert!(parsed > Duration::from_secs(25) && parsed <= Duration::from_secs(30));

    assert_eq!(parse_retry_after("soon"), None);
}

#[tokio::test]
async fn test_fetch_with_rate_limiter() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(mock_server.uri())
        .rate_limit(RateLimiterConfig::new(100, 10))
        .build();
    let client = HttpClient::with_config(config).unwrap();

    for _ in 0..3 {
        client.get_json("/data").await.unwrap();
    }
    assert!(client.has_rate_limiter());
}

// ============================================================================
// Backoff
// ============================================================================

fn backoff_client(backoff_type: BackoffType, max: Duration) -> HttpClient {
    let config = HttpClientConfig::builder()
        .backoff(backoff_type, Duration::from_millis(100), max)
        .no_rate_limit()
        .build();
    HttpClient::with_config(config).unwrap()
}

#[test]
fn test_calculate_backoff_constant() {
    let client = backoff_client(BackoffType::Constant, Duration::from_secs(10));

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(5), Duration::from_millis(100));
}

#[test]
fn test_calculate_backoff_linear() {
    let client = backoff_client(BackoffType::Linear, Duration::from_secs(10));

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(1), Duration::from_millis(200));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(300));
}

#[test]
fn test_calculate_backoff_exponential() {
    let client = backoff_client(BackoffType::Exponential, Duration::from_secs(10));

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(1), Duration::from_millis(200));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(400));
    assert_eq!(client.calculate_backoff(3), Duration::from_millis(800));
}

#[test]
fn test_calculate_backoff_respects_max() {
    let client = backoff_client(BackoffType::Exponential, Duration::from_millis(500));

    assert_eq!(client.calculate_backoff(10), Duration::from_millis(500));
    assert_eq!(client.calculate_backoff(64), Duration::from_millis(500));
}

#[test]
fn test_http_client_debug() {
    let client = HttpClient::new().unwrap();
    let debug_str = format!("{client:?}");
    assert!(debug_str.contains("HttpClient"));
    assert!(debug_str.contains("has_rate_limiter: true"));
}
