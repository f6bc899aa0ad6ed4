//! # Resource Fetcher
//!
//! The leaf of the crate: one GET per call, a JSON body back, and a typed
//! [`FetchError`] otherwise. Fetchers never retry and never cache; both are
//! the job of the layers above ([`PrefetchClient`](crate::cache::PrefetchClient)
//! caches, callers retry with `refetch()`).
//!
//! Fetchers work on untyped [`serde_json::Value`]s so that one fetcher (and
//! one cache entry) can serve callers expecting different shapes.
//! [`fetch_as`] turns the value into the caller's type.

use crate::config::FetchConfig;
use crate::error::{ConfigError, FetchError};
use crate::key::RequestKey;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Anything that can load a resource by key.
#[async_trait]
pub trait ResourceFetcher: Send + Sync + 'static {
    /// Loads the resource. Implementations may serve it from a cache.
    async fn fetch(&self, key: &RequestKey) -> Result<Value, FetchError>;

    /// Loads the resource, bypassing any fresh cached copy.
    async fn refresh(&self, key: &RequestKey) -> Result<Value, FetchError> {
        self.fetch(key).await
    }
}

/// Fetches `key` and deserializes the body into `T`.
pub async fn fetch_as<T: DeserializeOwned>(
    fetcher: &dyn ResourceFetcher,
    key: &RequestKey,
) -> Result<T, FetchError> {
    let value = fetcher.fetch(key).await?;
    decode(key, value)
}

/// Refreshes `key` and deserializes the body into `T`.
pub async fn refresh_as<T: DeserializeOwned>(
    fetcher: &dyn ResourceFetcher,
    key: &RequestKey,
) -> Result<T, FetchError> {
    let value = fetcher.refresh(key).await?;
    decode(key, value)
}

pub(crate) fn decode<T: DeserializeOwned>(key: &RequestKey, value: Value) -> Result<T, FetchError> {
    serde_json::from_value(value).map_err(|e| FetchError::parse(key, e.to_string()))
}

/// HTTP implementation of [`ResourceFetcher`] backed by `reqwest`.
///
/// Each key is requested as `GET <base_url><key>`; keys that are already
/// absolute URLs are requested as-is.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The full URL requested for `key`.
    pub fn url_for(&self, key: &RequestKey) -> String {
        if key.is_absolute() {
            return key.to_string();
        }
        if key.as_str().starts_with('/') {
            format!("{}{}", self.base_url, key)
        } else {
            format!("{}/{}", self.base_url, key)
        }
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn fetch(&self, key: &RequestKey) -> Result<Value, FetchError> {
        let url = self.url_for(key);
        debug!(%url, "GET");

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(error = %e, "Request failed");
            FetchError::network(key, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Unsuccessful response");
            return Err(FetchError::response(key, status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::network(key, e.to_string()))?;

        // A successful empty body is data, not a failure.
        if body.is_empty() {
            debug!(status = status.as_u16(), "Empty body");
            return Ok(Value::Null);
        }

        let value = serde_json::from_slice(&body).map_err(|e| {
            warn!(error = %e, "Body is not JSON");
            FetchError::parse(key, e.to_string())
        })?;
        debug!(status = status.as_u16(), bytes = body.len(), "Fetched");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_joins_base_and_path() {
        let config = FetchConfig::default().with_base_url("https://api.example.com/");
        let fetcher = HttpFetcher::new(&config).unwrap();
        assert_eq!(fetcher.base_url(), "https://api.example.com");

        assert_eq!(
            fetcher.url_for(&RequestKey::from("/users/u1")),
            "https://api.example.com/users/u1"
        );
        assert_eq!(
            fetcher.url_for(&RequestKey::from("users/u1")),
            "https://api.example.com/users/u1"
        );
        assert_eq!(
            fetcher.url_for(&RequestKey::from("http://other.test/x")),
            "http://other.test/x"
        );
    }

    #[test]
    fn test_decode_shape_mismatch_is_parse_error() {
        let key = RequestKey::from("/users/u1");
        let err = decode::<Vec<String>>(&key, serde_json::json!({"id": "u1"})).unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
        assert_eq!(err.key(), Some(&key));
    }
}
