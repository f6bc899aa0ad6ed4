//! # Async Resource
//!
//! Explicit, state-owning building blocks for the common data-fetching
//! patterns of frontend applications: loading/error/data state, parallel
//! requests, and prefetching with request deduplication.
//!
//! ## Architecture Overview
//!
//! The crate is layered, each layer depending only on the one below it:
//!
//! 1. **Fetcher** ([`ResourceFetcher`], [`HttpFetcher`]) - one GET per call, typed failures.
//! 2. **Prefetch cache** ([`cache`]) - an actor that deduplicates concurrent
//!    requests per key and keeps resolved values fresh for a configured TTL.
//!    Its client is itself a [`ResourceFetcher`].
//! 3. **State handles** ([`AsyncResource`], [`ParallelResource`]) - the
//!    `idle | loading | success | error` machines that callers observe.
//!
//! A UI layer (out of scope here) subscribes to a handle and calls
//! `fetch()` / `refetch()` from its own triggers: mount, hover, click.
//!
//! ## Example
//!
//! ```rust
//! use async_resource::cache::PrefetchCache;
//! use async_resource::mock::MockFetcher;
//! use async_resource::{AsyncResource, AsyncStatus, FetchConfig, ParallelResource};
//! use serde::Deserialize;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Deserialize)]
//! struct User { id: String, name: String }
//!
//! #[tokio::main]
//! async fn main() {
//!     // Any ResourceFetcher works as the upstream; HttpFetcher in production.
//!     let upstream = Arc::new(MockFetcher::new());
//!     upstream.expect("/users/u1").return_ok(json!({"id": "u1", "name": "Juntao Qiu"}));
//!     upstream.expect("/users/u1/friends").return_ok(json!([]));
//!
//!     let (cache, client) = PrefetchCache::new(&FetchConfig::default());
//!     tokio::spawn(cache.run(upstream.clone()));
//!     let client = Arc::new(client);
//!
//!     let page = ParallelResource::<(User, Vec<User>)>::new(
//!         client.clone(),
//!         ["/users/u1", "/users/u1/friends"],
//!     );
//!     let state = page.fetch().await;
//!     assert_eq!(state.status(), AsyncStatus::Success);
//!
//!     // Served from the cache, no second request.
//!     let user = AsyncResource::<User>::new(client.clone(), "/users/u1");
//!     assert_eq!(user.fetch().await.data().unwrap().name, "Juntao Qiu");
//!     assert_eq!(upstream.calls("/users/u1"), 1);
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! - All operations are async and suspend only at I/O boundaries.
//! - A state handle has at most one request that can commit: each new request
//!   bumps a generation, and a result only lands if its generation is current.
//! - The prefetch cache is the only shared mutable structure. It runs as a
//!   single actor task, so the check for an existing entry and the
//!   registration of a new pending one are a single step.
//! - Nothing is cancelled: superseded requests run to completion and their
//!   results are ignored.
//!
//! ## Testing
//!
//! See the [`mock`] module for [`MockFetcher`](mock::MockFetcher), which
//! scripts responses and delays per key and counts the calls made.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod key;
pub mod mock;
pub mod parallel;
pub mod state;
pub mod tracing;

// Re-export core types for convenience
pub use cache::{CacheStats, PrefetchCache, PrefetchClient};
pub use config::{CacheConfig, FetchConfig, Ttl};
pub use error::{ConfigError, ErrorInfo, FetchError};
pub use fetcher::{fetch_as, refresh_as, HttpFetcher, ResourceFetcher};
pub use key::RequestKey;
pub use parallel::{fetch_parallel, ParallelResource, ParallelState};
pub use state::{AsyncResource, AsyncState, AsyncStatus, Phase, RefetchPolicy};
