//! Configuration types for earnings-dl

use crate::error::{Error, Result};
use crate::types::Region;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Discovery settings: source fan-out, identity matching, fallback regions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Time bound for each individual source operation (default: 30 seconds)
    #[serde(default = "default_source_timeout", with = "duration_ms_serde")]
    pub source_timeout: Duration,

    /// Minimum similarity (0-100) for a source's company to count as a match (default: 80)
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Regions tried in order when the target region yields nothing for a company (default: none)
    #[serde(default)]
    pub fallback_regions: Vec<Region>,

    /// Separator for multi-company queries (default: ',')
    #[serde(default = "default_query_delimiter")]
    pub query_delimiter: char,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            source_timeout: default_source_timeout(),
            match_threshold: default_match_threshold(),
            fallback_regions: Vec::new(),
            query_delimiter: default_query_delimiter(),
        }
    }
}

/// Retry configuration for document retrieval
///
/// The delay before retry `n` (0-based) is `base_backoff * backoff_multiplier^n`, capped at
/// `max_backoff`, optionally jittered by up to +100%.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_base_backoff", with = "duration_ms_serde")]
    pub base_backoff: Duration,

    /// Upper bound for any single delay (default: 30 seconds)
    #[serde(default = "default_max_backoff", with = "duration_ms_serde")]
    pub max_backoff: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_backoff: default_base_backoff(),
            max_backoff: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Sanity check applied to every retrieved body
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayloadCheck {
    /// Smallest acceptable body (default: 1 byte, i.e. reject empty bodies)
    #[serde(default = "default_min_bytes")]
    pub min_bytes: u64,

    /// Largest acceptable body (default: unlimited)
    #[serde(default)]
    pub max_bytes: Option<u64>,

    /// Content-type prefixes accepted as a document, compared case-insensitively
    ///
    /// Anything else (HTML sign-in pages, plain-text or JSON error bodies) is rejected. A
    /// response without a content type is accepted. Default: PDF, Office (`application/vnd.`,
    /// `application/msword`), `application/octet-stream` and `audio/`.
    #[serde(default = "default_accepted_content_types")]
    pub accepted_content_types: Vec<String>,
}

impl Default for PayloadCheck {
    fn default() -> Self {
        Self {
            min_bytes: default_min_bytes(),
            max_bytes: None,
            accepted_content_types: default_accepted_content_types(),
        }
    }
}

/// Retrieval settings: worker pool, HTTP client, retry, payload check
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Workers retrieving documents at once (default: 6)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Time bound for one HTTP request (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_ms_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Retry behavior for failed requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Body sanity check
    #[serde(default)]
    pub payload: PayloadCheck,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            retry: RetryConfig::default(),
            payload: PayloadCheck::default(),
        }
    }
}

/// Main configuration for the pipeline
///
/// Constructed by the embedding application; every field has a working default.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Discovery settings
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    /// Retrieval settings
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Config {
    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let agg = &self.aggregator;
        if !(0.0..=100.0).contains(&agg.match_threshold) {
            return Err(Error::config(
                "aggregator.match_threshold",
                format!(
                    "must be between 0 and 100, got {}",
                    agg.match_threshold
                ),
            ));
        }
        if agg.source_timeout.is_zero() {
            return Err(Error::config(
                "aggregator.source_timeout",
                "must be greater than zero",
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = agg.fallback_regions.iter().find(|r| !seen.insert(**r)) {
            return Err(Error::config(
                "aggregator.fallback_regions",
                format!("region {dup} listed more than once"),
            ));
        }

        let fetch = &self.fetch;
        if fetch.max_concurrency == 0 {
            return Err(Error::config(
                "fetch.max_concurrency",
                "must be greater than zero",
            ));
        }
        if fetch.request_timeout.is_zero() {
            return Err(Error::config(
                "fetch.request_timeout",
                "must be greater than zero",
            ));
        }
        let multiplier = fetch.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::config(
                "fetch.retry.backoff_multiplier",
                format!("must be a finite number of at least 1.0, got {multiplier}"),
            ));
        }
        if fetch
            .payload
            .max_bytes
            .is_some_and(|max| max < fetch.payload.min_bytes)
        {
            return Err(Error::config(
                "fetch.payload.max_bytes",
                "must not be smaller than min_bytes",
            ));
        }
        Ok(())
    }
}

fn default_source_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_match_threshold() -> f64 {
    80.0
}

fn default_query_delimiter() -> char {
    ','
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_min_bytes() -> u64 {
    1
}

fn default_accepted_content_types() -> Vec<String> {
    [
        "application/pdf",
        "application/x-pdf",
        "application/vnd.",
        "application/msword",
        "application/octet-stream",
        "audio/",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_concurrency() -> usize {
    6
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

// Durations are stored as integer milliseconds
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
