//! HTTP client with retry and rate limiting
//!
//! Provides the adapter every resource fetches through:
//! - Automatic retries with configurable backoff for 5xx, timeouts and
//!   connection failures
//! - Cooldowns for 429 responses that honor `Retry-After`
//! - Client-side rate limiting to stay under the public API quotas
//! - JSON body decoding and error classification

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::error::{Error, Result};
use crate::types::BackoffType;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for relative request paths
    pub base_url: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Total number of attempts per request (first try included)
    pub max_attempts: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Cooldown after a 429 that carries no `Retry-After` hint
    pub rate_limit_cooldown: Duration,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            rate_limit_cooldown: Duration::from_secs(5),
            rate_limit: Some(RateLimiterConfig::default()),
            default_headers: HashMap::new(),
            user_agent: format!("pokechess-pipeline/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the total attempt budget per request
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set the fallback cooldown used for 429 responses without a hint
    pub fn rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.config.rate_limit_cooldown = cooldown;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters, sent in insertion order
    pub query: Vec<(String, String)>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

}

/// A successful response: status and decoded JSON body
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code (always 2xx)
    pub status: u16,
    /// Decoded JSON body
    pub body: Value,
}

/// Outcome of a single attempt that did not produce a response
struct AttemptFailure {
    error: Error,
    /// Server-provided wait before the next attempt (429 only)
    retry_after: Option<Duration>,
}

impl From<Error> for AttemptFailure {
    fn from(error: Error) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// GET a JSON document
    pub async fn get_json(&self, url: &str) -> Result<Value> {
        Ok(self.fetch(url, RequestConfig::default()).await?.body)
    }

    /// GET `url` with the given parameters, retrying transient failures
    ///
    /// Fails with a network error once the attempt budget is spent, with
    /// [`Error::RateLimited`] when 429s outlast it, with
    /// [`Error::NotFound`] on 404 and with a mapping error when the body
    /// is not JSON.
    pub async fn fetch(&self, url: &str, config: RequestConfig) -> Result<FetchResponse> {
        let full_url = self.build_url(url);
        let max_attempts = self.config.max_attempts.max(1);
        let timeout = self.config.timeout;

        let mut attempt = 0;
        loop {
            attempt += 1;

            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let mut req = self.client.get(&full_url).timeout(timeout);
            for (key, value) in &self.config.default_headers {
                req = req.header(key.as_str(), value.as_str());
            }
            if !config.query.is_empty() {
                req = req.query(&config.query);
            }

            let outcome = match req.send().await {
                Ok(response) => Self::read_response(response, &full_url).await,
                Err(e) if e.is_timeout() => Err(Error::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
                .into()),
                Err(e) => Err(Error::Http(e).into()),
            };

            let failure = match outcome {
                Ok(response) => {
                    debug!("GET {full_url} -> {} (attempt {attempt})", response.status);
                    return Ok(response);
                }
                Err(failure) => failure,
            };

            let Some(delay) = self.retry_delay(&failure, attempt) else {
                return Err(failure.error);
            };

            if attempt >= max_attempts {
                warn!(
                    "GET {full_url} failed after {attempt} attempt(s): {}",
                    failure.error
                );
                return Err(failure.error);
            }

            warn!(
                "GET {full_url} failed ({}), attempt {attempt}/{max_attempts}, retrying in {delay:?}",
                failure.error
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Turn a response into a decoded body or a classified failure
    async fn read_response(
        response: Response,
        url: &str,
    ) -> std::result::Result<FetchResponse, AttemptFailure> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = extract_retry_after(&response);
            return Err(AttemptFailure {
                error: Error::RateLimited {
                    retry_after_seconds: retry_after.map_or(0, |d| d.as_secs()),
                },
                retry_after,
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                url: url.to_string(),
            }
            .into());
        }

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), truncate_body(&body)).into());
        }

        let text = response.text().await.map_err(Error::Http)?;
        let body: Value = serde_json::from_str(&text).map_err(|e| {
            Error::mapping("$", format!("response from {url} is not valid JSON: {e}"))
        })?;

        Ok(FetchResponse {
            status: status.as_u16(),
            body,
        })
    }

    /// Delay before the next attempt, or `None` when the failure is final
    fn retry_delay(&self, failure: &AttemptFailure, attempt: u32) -> Option<Duration> {
        if !failure.error.is_retryable() {
            return None;
        }

        match failure.error {
            Error::RateLimited { .. } => {
                Some(failure.retry_after.unwrap_or(self.config.rate_limit_cooldown))
            }
            _ => Some(self.calculate_backoff(attempt.saturating_sub(1))),
        }
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }

    /// Calculate backoff delay for a given retry (0-based)
    pub fn calculate_backoff(&self, retry: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff * (retry + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(retry);
                self.config.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Extract the `Retry-After` header as a duration
fn extract_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP-date
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = at.with_timezone(&Utc) - Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

/// Keep error bodies short enough for logs and reports
fn truncate_body(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
