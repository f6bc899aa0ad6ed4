//! # Configuration
//!
//! Everything the crate does not decide on its own: where requests go, how
//! long they may take, and how long a cached value stays fresh.
//!
//! Values come from [`Default`] or from the environment via
//! [`FetchConfig::from_env`]:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `FETCH_BASE_URL` | Prefix for every request path | `http://localhost:8080` |
//! | `FETCH_TIMEOUT_MS` | Per-request timeout | `10000` |
//! | `FETCH_CACHE_TTL_MS` | Freshness of cached values, or `infinite` | `30000` |
//! | `FETCH_CACHE_MAX_ENTRIES` | Capacity of the prefetch cache | unbounded |

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long a resolved cache entry is considered fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ttl {
    Finite(Duration),
    Infinite,
}

impl Ttl {
    pub fn from_millis(ms: u64) -> Self {
        Ttl::Finite(Duration::from_millis(ms))
    }

    /// A zero TTL keeps nothing once it resolves; only in-flight calls are shared.
    pub fn stores_values(&self) -> bool {
        !matches!(self, Ttl::Finite(d) if d.is_zero())
    }

    fn parse(var: &'static str, raw: &str) -> Result<Self, ConfigError> {
        if raw.eq_ignore_ascii_case("infinite") {
            return Ok(Ttl::Infinite);
        }
        raw.parse::<u64>()
            .map(Ttl::from_millis)
            .map_err(|_| ConfigError::InvalidValue {
                var,
                value: raw.to_string(),
            })
    }
}

/// Settings for the prefetch cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl: Ttl,
    pub max_entries: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Ttl::from_millis(30_000),
            max_entries: None,
        }
    }
}

/// Settings for fetchers and the cache actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub cache: CacheConfig,
    /// Capacity of the cache actor's request channel.
    pub channel_capacity: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(10),
            user_agent: concat!("async-resource/", env!("CARGO_PKG_VERSION")).to_string(),
            cache: CacheConfig::default(),
            channel_capacity: 64,
        }
    }
}

impl FetchConfig {
    /// Reads overrides from the process environment on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`FetchConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("FETCH_BASE_URL") {
            if url.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    var: "FETCH_BASE_URL",
                    value: url,
                });
            }
            config.base_url = url;
        }
        if let Some(raw) = lookup("FETCH_TIMEOUT_MS") {
            let ms = parse_u64("FETCH_TIMEOUT_MS", &raw)?;
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("FETCH_CACHE_TTL_MS") {
            config.cache.ttl = Ttl::parse("FETCH_CACHE_TTL_MS", &raw)?;
        }
        if let Some(raw) = lookup("FETCH_CACHE_MAX_ENTRIES") {
            config.cache.max_entries = Some(parse_u64("FETCH_CACHE_MAX_ENTRIES", &raw)?);
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Ttl) -> Self {
        self.cache.ttl = ttl;
        self
    }
}

fn parse_u64(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = FetchConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, FetchConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = FetchConfig::from_lookup(lookup(&[
            ("FETCH_BASE_URL", "https://api.example.com"),
            ("FETCH_TIMEOUT_MS", "2500"),
            ("FETCH_CACHE_TTL_MS", "infinite"),
            ("FETCH_CACHE_MAX_ENTRIES", "100"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.cache.ttl, Ttl::Infinite);
        assert_eq!(config.cache.max_entries, Some(100));
    }

    #[test]
    fn test_invalid_ttl_is_rejected() {
        let err = FetchConfig::from_lookup(lookup(&[("FETCH_CACHE_TTL_MS", "soon")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var: "FETCH_CACHE_TTL_MS", .. }
        ));
    }

    #[test]
    fn test_zero_ttl_stores_nothing() {
        assert!(!Ttl::from_millis(0).stores_values());
        assert!(Ttl::from_millis(1).stores_values());
        assert!(Ttl::Infinite.stores_values());
    }
}
