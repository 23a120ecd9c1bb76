//! HTTP client module
//!
//! Provides the HTTP adapter every resource fetches through.
//!
//! # Features
//!
//! - **Automatic Retries**: 5xx, timeouts and connection failures, bounded
//!   by a total attempt budget
//! - **429 Handling**: waits for `Retry-After` (seconds or HTTP-date) or a
//!   fixed cooldown before retrying
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Backoff Strategies**: Constant, linear, and exponential backoff

mod client;
mod rate_limit;

pub use client::{FetchResponse, HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
