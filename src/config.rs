//! Configuration resolution
//!
//! Raw settings arrive from three layers, lowest precedence first:
//! environment variables, a YAML/JSON config file and CLI flags. They are
//! merged into one [`RawConfig`] and validated by [`ConfigResolver`] into an
//! [`ExecutionContext`] before any network activity happens.

use crate::engine::IterationScope;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RateLimiterConfig};
use crate::resource::{ResourceDescriptor, ResourceRegistry};
use crate::types::{Source, YearMonth};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Entity names as accepted by the Chess.com API
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]+$").expect("valid regex"));

/// Plain SQL identifier
static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// Default for `http_timeout_secs`
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default for `max_attempts`
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default for `requests_per_second`
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 10;
/// Dataset used when the selection spans both sources
pub const MIXED_DATASET: &str = "api_data";

// ============================================================================
// Raw configuration
// ============================================================================

/// Unvalidated settings from one layer
///
/// Lists accept either a sequence or a comma-separated string. Numbers
/// accept either a number or a numeric string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Resource names to load
    #[serde(default, deserialize_with = "de_list")]
    pub resources: Option<Vec<String>>,

    /// Cap on listed items for flat-paginated resources
    #[serde(default, deserialize_with = "de_scalar")]
    pub entity_limit: Option<String>,

    /// Entities (player usernames) for per-entity and date-windowed resources
    #[serde(default, deserialize_with = "de_list")]
    pub entities: Option<Vec<String>>,

    /// First month, `YYYY/MM` or `YYYY-MM`
    #[serde(default, deserialize_with = "de_scalar")]
    pub start_period: Option<String>,

    /// Last month, inclusive
    #[serde(default, deserialize_with = "de_scalar")]
    pub end_period: Option<String>,

    /// Warehouse dataset (schema) to load into
    #[serde(default, deserialize_with = "de_scalar")]
    pub target_dataset: Option<String>,

    /// PokeAPI base URL override
    #[serde(default, deserialize_with = "de_scalar")]
    pub pokemon_base_url: Option<String>,

    /// Chess.com API base URL override
    #[serde(default, deserialize_with = "de_scalar")]
    pub chess_base_url: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default, deserialize_with = "de_scalar")]
    pub http_timeout_secs: Option<String>,

    /// Total attempts per request
    #[serde(default, deserialize_with = "de_scalar")]
    pub max_attempts: Option<String>,

    /// Client-side request rate per source
    #[serde(default, deserialize_with = "de_scalar")]
    pub requests_per_second: Option<String>,

    /// Resources loaded at the same time
    #[serde(default, deserialize_with = "de_scalar")]
    pub max_concurrent_resources: Option<String>,
}

impl RawConfig {
    /// Read the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read environment-style variables through `lookup`
    ///
    /// `PIPELINE_<KEY>` variables win over the per-source variables
    /// (`POKEMON_RESOURCES`, `CHESS_PLAYERS`, ...).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let var = |key: &str| get(&format!("PIPELINE_{}", key.to_ascii_uppercase()));

        let source_resources = {
            let mut names = Vec::new();
            for key in ["POKEMON_RESOURCES", "CHESS_RESOURCES"] {
                if let Some(value) = get(key) {
                    names.extend(split_list(&value));
                }
            }
            (!names.is_empty()).then_some(names)
        };

        Self {
            resources: var("resources").map(|v| split_list(&v)).or(source_resources),
            entity_limit: var("entity_limit").or_else(|| get("POKEMON_LIMIT")),
            entities: var("entities")
                .or_else(|| get("CHESS_PLAYERS"))
                .map(|v| split_list(&v)),
            start_period: var("start_period").or_else(|| get("CHESS_START_MONTH")),
            end_period: var("end_period").or_else(|| get("CHESS_END_MONTH")),
            target_dataset: var("target_dataset"),
            pokemon_base_url: var("pokemon_base_url"),
            chess_base_url: var("chess_base_url"),
            http_timeout_secs: var("http_timeout_secs"),
            max_attempts: var("max_attempts"),
            requests_per_second: var("requests_per_second"),
            max_concurrent_resources: var("max_concurrent_resources"),
        }
    }

    /// Parse a YAML (or JSON) document
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load a YAML or JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Overlay `higher` on top of `self`; set fields of `higher` win
    #[must_use]
    pub fn merge(self, higher: Self) -> Self {
        Self {
            resources: higher.resources.or(self.resources),
            entity_limit: higher.entity_limit.or(self.entity_limit),
            entities: higher.entities.or(self.entities),
            start_period: higher.start_period.or(self.start_period),
            end_period: higher.end_period.or(self.end_period),
            target_dataset: higher.target_dataset.or(self.target_dataset),
            pokemon_base_url: higher.pokemon_base_url.or(self.pokemon_base_url),
            chess_base_url: higher.chess_base_url.or(self.chess_base_url),
            http_timeout_secs: higher.http_timeout_secs.or(self.http_timeout_secs),
            max_attempts: higher.max_attempts.or(self.max_attempts),
            requests_per_second: higher.requests_per_second.or(self.requests_per_second),
            max_concurrent_resources: higher
                .max_concurrent_resources
                .or(self.max_concurrent_resources),
        }
    }
}

/// Comma-separated values, trimmed, empties dropped
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListValue {
    Items(Vec<ScalarValue>),
    Joined(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl ScalarValue {
    fn into_string(self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Text(s) => s,
        }
    }
}

fn de_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error> {
    Ok(Option::<ListValue>::deserialize(deserializer)?.map(|value| match value {
        ListValue::Items(items) => items
            .into_iter()
            .map(|s| s.into_string().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        ListValue::Joined(s) => split_list(&s),
    }))
}

fn de_scalar<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<ScalarValue>::deserialize(deserializer)?.map(ScalarValue::into_string))
}

// ============================================================================
// Execution context
// ============================================================================

/// HTTP settings shared by both sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HttpSettings {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Total attempts per request
    pub max_attempts: u32,
    /// Client-side request rate
    pub requests_per_second: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
        }
    }
}

/// One validated invocation, built once and passed to the runner
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Selected resources, deduplicated, in the order given
    pub resources: Vec<&'static ResourceDescriptor>,
    /// Cap on listed items for flat-paginated resources
    pub entity_limit: Option<u64>,
    /// Entities, normalized, in the order given
    pub entities: Vec<String>,
    /// First month, inclusive
    pub start: YearMonth,
    /// Last month, inclusive
    pub end: YearMonth,
    /// Dataset to load into
    pub target_dataset: String,
    /// PokeAPI base URL
    pub pokemon_base_url: Url,
    /// Chess.com API base URL
    pub chess_base_url: Url,
    /// HTTP settings
    pub http: HttpSettings,
    /// Resources loaded at the same time
    pub max_concurrent_resources: usize,
    /// Run timestamp; its month is the still-open reference month
    pub checked_at: DateTime<Utc>,
}

impl ExecutionContext {
    /// Names of the selected resources
    pub fn resource_names(&self) -> Vec<&'static str> {
        self.resources.iter().map(|r| r.name).collect()
    }

    /// Month of the run timestamp
    pub fn reference_month(&self) -> YearMonth {
        YearMonth::from_date(self.checked_at.date_naive())
    }

    /// Iteration scope shared by every resource of the run
    pub fn scope(&self) -> IterationScope {
        let mut scope = IterationScope::new(self.checked_at)
            .with_entities(self.entities.clone())
            .with_entity_limit(self.entity_limit)
            .with_months(self.start, self.end);
        scope.reference_month = self.reference_month();
        scope
    }

    /// Base URL of a source
    pub fn base_url(&self, source: Source) -> &Url {
        match source {
            Source::Pokemon => &self.pokemon_base_url,
            Source::Chess => &self.chess_base_url,
        }
    }

    /// HTTP client configuration for a source
    pub fn http_config(&self, source: Source) -> HttpClientConfig {
        HttpClientConfig::builder()
            .base_url(self.base_url(source).as_str())
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .max_attempts(self.http.max_attempts)
            .rate_limit(RateLimiterConfig::per_second(self.http.requests_per_second))
            .build()
    }

    /// HTTP client for a source
    pub fn http_client(&self, source: Source) -> Result<HttpClient> {
        HttpClient::with_config(self.http_config(source))
    }

    /// JSON summary, as printed by `validate`
    pub fn describe(&self) -> serde_json::Value {
        json!({
            "resources": self.resource_names(),
            "entity_limit": self.entity_limit,
            "entities": self.entities,
            "start_period": self.start,
            "end_period": self.end,
            "target_dataset": self.target_dataset,
            "pokemon_base_url": self.pokemon_base_url.as_str(),
            "chess_base_url": self.chess_base_url.as_str(),
            "http": self.http,
            "max_concurrent_resources": self.max_concurrent_resources,
            "reference_month": self.reference_month(),
        })
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Validates a [`RawConfig`] into an [`ExecutionContext`]
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    registry: ResourceRegistry,
    now: DateTime<Utc>,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(ResourceRegistry::builtin())
    }
}

impl ConfigResolver {
    /// Resolver over `registry`, timestamped now
    pub fn new(registry: ResourceRegistry) -> Self {
        Self {
            registry,
            now: Utc::now(),
        }
    }

    /// Use a fixed run timestamp
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Validate `raw`
    pub fn resolve(&self, raw: &RawConfig) -> Result<ExecutionContext> {
        let resources = self.resolve_resources(raw.resources.as_deref())?;

        let entity_limit = raw
            .entity_limit
            .as_deref()
            .map(|v| positive_int("entity_limit", v))
            .transpose()?;

        let entities = resolve_entities(raw.entities.as_deref().unwrap_or_default())?;
        if entities.is_empty() {
            if let Some(needy) = resources.iter().find(|r| r.strategy.needs_entities()) {
                return Err(Error::invalid_value(
                    "entities",
                    format!("resource '{}' needs at least one entity", needy.name),
                ));
            }
        }

        let (start, end) = self.resolve_periods(raw)?;

        let target_dataset = match raw.target_dataset.as_deref() {
            Some(name) => dataset_name(name)?,
            None => default_dataset(&resources).to_string(),
        };

        let http = HttpSettings {
            timeout_secs: optional_int("http_timeout_secs", raw.http_timeout_secs.as_deref())?
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            max_attempts: optional_u32("max_attempts", raw.max_attempts.as_deref())?
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            requests_per_second: optional_u32(
                "requests_per_second",
                raw.requests_per_second.as_deref(),
            )?
            .unwrap_or(DEFAULT_REQUESTS_PER_SECOND),
        };

        let max_concurrent_resources = optional_int(
            "max_concurrent_resources",
            raw.max_concurrent_resources.as_deref(),
        )?
        .map_or(1, |n| n as usize);

        Ok(ExecutionContext {
            resources,
            entity_limit,
            entities,
            start,
            end,
            target_dataset,
            pokemon_base_url: base_url(
                "pokemon_base_url",
                raw.pokemon_base_url.as_deref(),
                Source::Pokemon,
            )?,
            chess_base_url: base_url(
                "chess_base_url",
                raw.chess_base_url.as_deref(),
                Source::Chess,
            )?,
            http,
            max_concurrent_resources,
            checked_at: self.now,
        })
    }

    /// Target dataset alone, for commands that never reach a source API
    pub fn resolve_dataset(&self, raw: &RawConfig) -> Result<String> {
        match raw.target_dataset.as_deref() {
            Some(name) => dataset_name(name),
            None => {
                let resources = self.resolve_resources(raw.resources.as_deref())?;
                Ok(default_dataset(&resources).to_string())
            }
        }
    }

    fn resolve_resources(
        &self,
        names: Option<&[String]>,
    ) -> Result<Vec<&'static ResourceDescriptor>> {
        let names = names.unwrap_or_default();
        if names.is_empty() {
            return Err(Error::missing_field("resources"));
        }

        let mut seen = HashSet::new();
        let mut resources = Vec::new();
        for name in names {
            let descriptor = self.registry.get(name)?;
            if seen.insert(descriptor.name) {
                resources.push(descriptor);
            }
        }
        Ok(resources)
    }

    fn resolve_periods(&self, raw: &RawConfig) -> Result<(YearMonth, YearMonth)> {
        let parse = |field: &str, value: &str| {
            value
                .parse::<YearMonth>()
                .map_err(|e| Error::invalid_value(field, e.to_string()))
        };

        match (raw.start_period.as_deref(), raw.end_period.as_deref()) {
            (Some(start), Some(end)) => {
                let start = parse("start_period", start)?;
                let end = parse("end_period", end)?;
                if start > end {
                    return Err(Error::invalid_value(
                        "start_period",
                        format!("{start} is after end_period {end}"),
                    ));
                }
                Ok((start, end))
            }
            (None, None) => {
                let end = YearMonth::from_date(self.now.date_naive());
                Ok((end.minus_months(2), end))
            }
            (Some(_), None) => Err(Error::missing_field("end_period")),
            (None, Some(_)) => Err(Error::missing_field("start_period")),
        }
    }
}

/// Trimmed, lower-cased, deduplicated entity names
fn resolve_entities(raw: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut entities = Vec::new();
    for entity in raw {
        let entity = entity.trim().to_ascii_lowercase();
        if entity.is_empty() {
            continue;
        }
        if !ENTITY_RE.is_match(&entity) {
            return Err(Error::invalid_value(
                "entities",
                format!("'{entity}' may only contain a-z, 0-9, '_' and '-'"),
            ));
        }
        if seen.insert(entity.clone()) {
            entities.push(entity);
        }
    }
    Ok(entities)
}

fn dataset_name(name: &str) -> Result<String> {
    let name = name.trim();
    if !IDENT_RE.is_match(name) {
        return Err(Error::invalid_value(
            "target_dataset",
            format!("'{name}' is not a plain identifier"),
        ));
    }
    Ok(name.to_string())
}

fn default_dataset(resources: &[&'static ResourceDescriptor]) -> &'static str {
    let sources: HashSet<Source> = resources.iter().map(|r| r.source).collect();
    match sources.into_iter().collect::<Vec<_>>().as_slice() {
        [only] => only.default_dataset(),
        _ => MIXED_DATASET,
    }
}

fn positive_int(field: &str, value: &str) -> Result<u64> {
    let n: i64 = value
        .trim()
        .parse()
        .map_err(|_| Error::invalid_value(field, format!("'{value}' is not an integer")))?;
    if n <= 0 {
        return Err(Error::invalid_value(field, format!("must be positive, got {n}")));
    }
    Ok(n as u64)
}

fn optional_int(field: &str, value: Option<&str>) -> Result<Option<u64>> {
    value.map(|v| positive_int(field, v)).transpose()
}

fn optional_u32(field: &str, value: Option<&str>) -> Result<Option<u32>> {
    optional_int(field, value)?
        .map(|n| {
            u32::try_from(n).map_err(|_| Error::invalid_value(field, format!("{n} is too large")))
        })
        .transpose()
}

fn base_url(field: &str, value: Option<&str>, source: Source) -> Result<Url> {
    let raw = value.map_or(source.default_base_url(), str::trim);
    let url = Url::parse(raw).map_err(|e| Error::invalid_value(field, format!("'{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::invalid_value(
            field,
            format!("'{raw}' must be an http(s) URL"),
        ));
    }
    Ok(url)
}
