use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use url::Url;

use crate::error::FetchError;
use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://test.superhero.hu";

/// Freshness windows for cached queries.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "field_list_fresh_for_ms")]
    pub field_list_fresh_for: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "choice_set_fresh_for_ms")]
    pub choice_set_fresh_for: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            field_list_fresh_for: Duration::from_secs(5 * 60),
            choice_set_fresh_for: Duration::from_secs(10 * 60),
        }
    }
}

/// Everything the remote data cache needs to know, passed explicitly at construction.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "request_timeout_ms")]
    pub request_timeout: Duration,
    pub cache: CacheConfig,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            cache: CacheConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Parsed base URL, normalized to end with a slash so relative joins keep its path.
    pub fn base(&self) -> Result<Url, FetchError> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|err| FetchError::Url(format!("{raw}: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_contract() {
        let config = ClientConfig::default();
        assert_eq!(config.cache.field_list_fresh_for, Duration::from_secs(300));
        assert_eq!(config.cache.choice_set_fresh_for, Duration::from_secs(600));
        assert_eq!(config.retry.metadata_retries, 3);
        assert_eq!(config.retry.submission_retries, 1);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ClientConfig = serde_json::from_value(serde_json::json!({
            "base_url": "http://localhost:8080/api",
            "cache": { "field_list_fresh_for_ms": 1000 }
        }))
        .expect("config should parse");
        assert_eq!(config.cache.field_list_fresh_for, Duration::from_secs(1));
        assert_eq!(config.cache.choice_set_fresh_for, Duration::from_secs(600));
        assert_eq!(
            config.base().expect("url").as_str(),
            "http://localhost:8080/api/"
        );
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let config = ClientConfig::default().with_base_url("not a url");
        assert!(matches!(config.base(), Err(FetchError::Url(_))));
    }
}
