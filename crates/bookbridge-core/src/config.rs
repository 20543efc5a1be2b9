//! Runtime configuration shared by every stage.
//!
//! All fields have defaults, so a config file only needs the keys it overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Base addresses of the aggregator's two surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Desktop site: search, ISBN lookup, review listing, record pages.
    pub book_base: String,
    /// Mobile API host serving structured rating payloads.
    pub mobile_base: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            book_base: "https://book.douban.com".into(),
            mobile_base: "https://m.douban.com".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub isbn_wait_ms: u64,
    pub isbn_poll_ms: u64,
    /// Scan the whole page body when no ISBN region matched. Noisy.
    pub body_isbn_fallback: bool,
    pub isbn_resolve_cap_ms: u64,
    pub http_timeout_ms: u64,
    pub max_reviews: usize,
    pub max_review_len: usize,
    pub rating_ttl_secs: u64,
    pub detail_host: String,
    pub endpoints: EndpointConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            isbn_wait_ms: 120,
            isbn_poll_ms: 60,
            body_isbn_fallback: false,
            isbn_resolve_cap_ms: 700,
            http_timeout_ms: 2800,
            max_reviews: 5,
            max_review_len: 85,
            rating_ttl_secs: 6 * 3600,
            detail_host: "book.kongfz.com".into(),
            endpoints: EndpointConfig::default(),
        }
    }
}

impl Config {
    /// Load a JSON config file, filling unspecified fields with defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall or disable a stage outright.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &'static str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid { field, reason })
        };
        if self.isbn_poll_ms == 0 {
            return invalid("isbn_poll_ms", "must be at least 1");
        }
        if self.http_timeout_ms == 0 {
            return invalid("http_timeout_ms", "must be at least 1");
        }
        if self.isbn_resolve_cap_ms == 0 {
            return invalid("isbn_resolve_cap_ms", "must be at least 1");
        }
        if self.detail_host.trim().is_empty() {
            return invalid("detail_host", "must not be empty");
        }
        Ok(())
    }

    pub fn isbn_wait(&self) -> Duration {
        Duration::from_millis(self.isbn_wait_ms)
    }

    /// Never zero, even for a config built in code without [`validate`].
    ///
    /// [`validate`]: Config::validate
    pub fn isbn_poll(&self) -> Duration {
        Duration::from_millis(self.isbn_poll_ms.max(1))
    }

    pub fn isbn_resolve_cap(&self) -> Duration {
        Duration::from_millis(self.isbn_resolve_cap_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn rating_ttl(&self) -> Duration {
        Duration::from_secs(self.rating_ttl_secs)
    }
}
