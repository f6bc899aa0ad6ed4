//! # Prefetch Client
//!
//! The clonable interface to a running [`PrefetchCache`](super::PrefetchCache).

use super::message::CacheRequest;
use super::CacheStats;
use crate::error::FetchError;
use crate::fetcher::{decode, ResourceFetcher};
use crate::key::RequestKey;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

/// A type-safe client for the prefetch cache actor.
///
/// Cheap to clone: it only holds a channel sender. It also implements
/// [`ResourceFetcher`], so state handles can be built on top of the cache
/// instead of on the raw network fetcher.
#[derive(Clone)]
pub struct PrefetchClient {
    sender: mpsc::Sender<CacheRequest>,
}

impl PrefetchClient {
    pub fn new(sender: mpsc::Sender<CacheRequest>) -> Self {
        Self { sender }
    }

    /// Returns the cached value for `key`, sharing or starting a fetch as needed.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn get_or_fetch(&self, key: &RequestKey) -> Result<Value, FetchError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(CacheRequest::GetOrFetch {
                key: key.clone(),
                respond_to,
            })
            .await
            .map_err(|_| FetchError::CacheClosed)?;
        response.await.map_err(|_| FetchError::CacheClosed)?
    }

    pub async fn get_or_fetch_as<T: DeserializeOwned>(&self, key: &RequestKey) -> Result<T, FetchError> {
        let value = self.get_or_fetch(key).await?;
        decode(key, value)
    }

    /// Fetches `key` again even if a fresh value is cached.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn refresh(&self, key: &RequestKey) -> Result<Value, FetchError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(CacheRequest::Refresh {
                key: key.clone(),
                respond_to,
            })
            .await
            .map_err(|_| FetchError::CacheClosed)?;
        response.await.map_err(|_| FetchError::CacheClosed)?
    }

    /// Speculatively warms `key` (e.g. on hover). Does not wait.
    ///
    /// Returns `false` when the request could not be queued because the cache
    /// is closed or its channel is full; a dropped prefetch only costs a later
    /// cache miss.
    pub fn prefetch(&self, key: impl Into<RequestKey>) -> bool {
        let key = key.into();
        match self.sender.try_send(CacheRequest::Prefetch { key: key.clone() }) {
            Ok(()) => true,
            Err(e) => {
                debug!(%key, error = %e, "Prefetch dropped");
                false
            }
        }
    }

    /// Prefetches every key, returning how many were queued.
    pub fn prefetch_many<K: Into<RequestKey>>(&self, keys: impl IntoIterator<Item = K>) -> usize {
        keys.into_iter()
            .map(|key| self.prefetch(key))
            .filter(|queued| *queued)
            .count()
    }

    /// Drops the resolved entry for `key`. Returns whether one existed.
    pub async fn invalidate(&self, key: &RequestKey) -> Result<bool, FetchError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(CacheRequest::Invalidate {
                key: key.clone(),
                respond_to,
            })
            .await
            .map_err(|_| FetchError::CacheClosed)?;
        response.await.map_err(|_| FetchError::CacheClosed)
    }

    /// Drops every resolved entry. In-flight requests are unaffected.
    pub async fn clear(&self) -> Result<(), FetchError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(CacheRequest::Clear { respond_to })
            .await
            .map_err(|_| FetchError::CacheClosed)?;
        response.await.map_err(|_| FetchError::CacheClosed)
    }

    pub async fn stats(&self) -> Result<CacheStats, FetchError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(CacheRequest::Stats { respond_to })
            .await
            .map_err(|_| FetchError::CacheClosed)?;
        response.await.map_err(|_| FetchError::CacheClosed)
    }
}

#[async_trait]
impl ResourceFetcher for PrefetchClient {
    async fn fetch(&self, key: &RequestKey) -> Result<Value, FetchError> {
        self.get_or_fetch(key).await
    }

    async fn refresh(&self, key: &RequestKey) -> Result<Value, FetchError> {
        PrefetchClient::refresh(self, key).await
    }
}
