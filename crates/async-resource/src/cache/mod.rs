//! # Prefetch Cache
//!
//! A keyed store of in-flight and completed fetches that sits in front of a
//! [`ResourceFetcher`](crate::ResourceFetcher).
//!
//! - Concurrent callers for the same key share one upstream call.
//! - A speculative [`prefetch`](PrefetchClient::prefetch) (say, on hover)
//!   registers the same pending entry a later consumer will find, so the
//!   consumer either joins the in-flight call or reads the resolved value.
//! - Resolved values stay fresh for the configured [`Ttl`](crate::Ttl).
//!   Failures are never cached.
//!
//! The cache is an actor: [`PrefetchCache`] owns the state and runs in its own
//! task, [`PrefetchClient`] talks to it over a channel.
//!
//! ```rust
//! use async_resource::cache::PrefetchCache;
//! use async_resource::mock::MockFetcher;
//! use async_resource::{FetchConfig, RequestKey};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let upstream = Arc::new(MockFetcher::new());
//!     upstream.expect("/users/u1").return_ok(json!({"id": "u1"}));
//!
//!     let (cache, client) = PrefetchCache::new(&FetchConfig::default());
//!     tokio::spawn(cache.run(upstream.clone()));
//!
//!     let key = RequestKey::from("/users/u1");
//!     client.prefetch(key.clone());
//!     let value = client.get_or_fetch(&key).await.unwrap();
//!     assert_eq!(value["id"], "u1");
//!     assert_eq!(upstream.calls("/users/u1"), 1);
//! }
//! ```

pub mod actor;
pub mod client;
pub mod message;
pub mod store;

pub use actor::PrefetchCache;
pub use client::PrefetchClient;
pub use message::{CacheRequest, Response};
pub use store::{CachedValue, EntryStore, MemoryStore};

use serde::Serialize;

/// Counters reported by [`PrefetchClient::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Resolved entries currently stored (approximate).
    pub entries: u64,
    /// Keys with an upstream call in flight.
    pub in_flight: usize,
    /// Requests answered from a fresh entry.
    pub hits: u64,
    /// Requests (including prefetches and refreshes) that started an upstream call.
    pub misses: u64,
    /// Requests that joined an in-flight call.
    pub joins: u64,
}
