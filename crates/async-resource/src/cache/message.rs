//! # Cache Messages
//!
//! The messages exchanged between a [`PrefetchClient`](super::PrefetchClient)
//! and the [`PrefetchCache`](super::PrefetchCache) actor.

use super::CacheStats;
use crate::error::FetchError;
use crate::key::RequestKey;
use serde_json::Value;
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by the cache.
pub type Response<T> = oneshot::Sender<Result<T, FetchError>>;

/// Requests processed sequentially by the cache actor.
///
/// Because one task handles every message in order, "is there an entry for
/// this key?" and "register a pending entry" happen in a single step. No
/// other caller can slip in between and start a second request.
#[derive(Debug)]
pub enum CacheRequest {
    /// Answer from a fresh entry, join a pending one, or start a fetch.
    GetOrFetch {
        key: RequestKey,
        respond_to: Response<Value>,
    },
    /// Like `GetOrFetch`, but a resolved entry is dropped and fetched again.
    Refresh {
        key: RequestKey,
        respond_to: Response<Value>,
    },
    /// Speculative fetch with no waiter.
    Prefetch { key: RequestKey },
    Invalidate {
        key: RequestKey,
        respond_to: oneshot::Sender<bool>,
    },
    Clear { respond_to: oneshot::Sender<()> },
    Stats { respond_to: oneshot::Sender<CacheStats> },
    /// Sent by the cache's own fetch tasks when an upstream call settles.
    Settled {
        key: RequestKey,
        result: Result<Value, FetchError>,
    },
}
