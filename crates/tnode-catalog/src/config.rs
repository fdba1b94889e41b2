//! Catalog client configuration.
//!
//! Defaults point at a local catalog. Override via environment variables or
//! explicit construction for tests.

use std::time::Duration;

use url::Url;
use zeroize::Zeroizing;

use crate::retry::RetryPolicy;

/// Configuration for the catalog HTTP API.
///
/// Custom `Debug` implementation redacts the `api_token` field.
#[derive(Clone)]
pub struct CatalogConfig {
    pub base_url: Url,
    /// Optional bearer token.
    pub api_token: Option<Zeroizing<String>>,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("base_url", &self.base_url)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

impl CatalogConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `TNODE_CATALOG_URL` (default: `http://127.0.0.1:7001`)
    /// - `TNODE_CATALOG_TOKEN` (optional)
    /// - `TNODE_CATALOG_TIMEOUT_SECS` (default: 10)
    /// - `TNODE_CATALOG_RETRIES` (default: 2)
    /// - `TNODE_CATALOG_RETRY_DELAY_MS` (default: 100)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = RetryPolicy::default();
        Ok(Self {
            base_url: env_url("TNODE_CATALOG_URL", "http://127.0.0.1:7001")?,
            api_token: std::env::var("TNODE_CATALOG_TOKEN")
                .ok()
                .filter(|t| !t.is_empty())
                .map(Zeroizing::new),
            timeout_secs: std::env::var("TNODE_CATALOG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            retry: RetryPolicy {
                max_retries: env_parse("TNODE_CATALOG_RETRIES").unwrap_or(defaults.max_retries),
                base_delay: env_parse("TNODE_CATALOG_RETRY_DELAY_MS")
                    .map_or(defaults.base_delay, Duration::from_millis),
            },
        })
    }

    /// Configuration pointing at a local mock server.
    pub fn local(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: Url::parse(base_url)
                .map_err(|e| ConfigError::InvalidUrl(base_url.to_string(), e.to_string()))?,
            api_token: None,
            timeout_secs: 5,
            retry: RetryPolicy::none(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.api_token = Some(Zeroizing::new(token.to_string()));
        self
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|s| s.trim().parse().ok())
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("catalog token contains characters not allowed in a header")]
    InvalidToken,
}
