//! # Prefetch Cache Actor
//!
//! The server half of the cache. It owns the entry store and the table of
//! in-flight requests, and processes every [`CacheRequest`] sequentially in
//! its own Tokio task, so neither needs a lock.

use super::message::{CacheRequest, Response};
use super::store::{CachedValue, EntryStore, MemoryStore};
use super::{CacheStats, PrefetchClient};
use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::fetcher::ResourceFetcher;
use crate::key::RequestKey;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// The cache actor.
///
/// # Entry Lifecycle
///
/// * **Miss**: a pending entry holding the caller's responder is registered
///   and one upstream call is spawned.
/// * **Join**: later callers for a pending key are added to its waiters.
/// * **Settle**: on success the value moves into the store and every waiter
///   gets a copy; on failure the pending entry is removed and every waiter
///   gets the error, so the next caller starts over.
/// * **Hit**: a fresh stored value is returned without an upstream call.
///
/// # Shutdown
///
/// The actor keeps only a weak handle to its own channel. It stops once every
/// [`PrefetchClient`] has been dropped and all in-flight calls have settled.
pub struct PrefetchCache<S: EntryStore = MemoryStore> {
    receiver: mpsc::Receiver<CacheRequest>,
    sender: mpsc::WeakSender<CacheRequest>,
    store: S,
    pending: HashMap<RequestKey, Vec<Response<Value>>>,
    store_values: bool,
    stats: CacheStats,
}

impl PrefetchCache<MemoryStore> {
    /// Creates a cache backed by a [`MemoryStore`] and its client.
    ///
    /// The actor does nothing until [`run`](PrefetchCache::run) is spawned.
    pub fn new(config: &FetchConfig) -> (Self, PrefetchClient) {
        Self::with_store(config, MemoryStore::new(&config.cache))
    }
}

impl<S: EntryStore> PrefetchCache<S> {
    /// Creates a cache over a caller-supplied store.
    pub fn with_store(config: &FetchConfig, store: S) -> (Self, PrefetchClient) {
        let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));
        let actor = Self {
            receiver,
            sender: sender.downgrade(),
            store,
            pending: HashMap::new(),
            store_values: config.cache.ttl.stores_values(),
            stats: CacheStats::default(),
        };
        (actor, PrefetchClient::new(sender))
    }

    /// Runs the event loop until every client is gone.
    ///
    /// # Context Injection
    /// `upstream` is the fetcher that really goes to the network. It is
    /// injected here rather than in the constructor so the client can be
    /// handed out before the upstream is built.
    pub async fn run(mut self, upstream: Arc<dyn ResourceFetcher>) {
        info!("Prefetch cache started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                CacheRequest::GetOrFetch { key, respond_to } => {
                    if let Some(cached) = self.store.get(&key) {
                        self.stats.hits += 1;
                        debug!(%key, "Hit");
                        let _ = respond_to.send(Ok(cached.value));
                    } else if let Some(waiters) = self.pending.get_mut(&key) {
                        self.stats.joins += 1;
                        waiters.push(respond_to);
                        debug!(%key, waiters = waiters.len(), "Joined in-flight request");
                    } else {
                        self.stats.misses += 1;
                        debug!(%key, "Miss");
                        self.start(key, vec![respond_to], &upstream, false);
                    }
                }
                CacheRequest::Refresh { key, respond_to } => {
                    if let Some(waiters) = self.pending.get_mut(&key) {
                        self.stats.joins += 1;
                        waiters.push(respond_to);
                        debug!(%key, "Refresh joined in-flight request");
                    } else {
                        self.store.invalidate(&key);
                        self.stats.misses += 1;
                        debug!(%key, "Refresh");
                        self.start(key, vec![respond_to], &upstream, true);
                    }
                }
                CacheRequest::Prefetch { key } => {
                    if self.pending.contains_key(&key) || self.store.get(&key).is_some() {
                        debug!(%key, "Prefetch skipped, already cached or loading");
                    } else {
                        self.stats.misses += 1;
                        debug!(%key, "Prefetch");
                        self.start(key, Vec::new(), &upstream, false);
                    }
                }
                CacheRequest::Invalidate { key, respond_to } => {
                    let removed = self.store.invalidate(&key);
                    debug!(%key, removed, "Invalidate");
                    let _ = respond_to.send(removed);
                }
                CacheRequest::Clear { respond_to } => {
                    self.store.clear();
                    debug!("Clear");
                    let _ = respond_to.send(());
                }
                CacheRequest::Stats { respond_to } => {
                    let _ = respond_to.send(self.snapshot());
                }
                CacheRequest::Settled { key, result } => self.settle(key, result),
            }
        }

        info!(
            hits = self.stats.hits,
            misses = self.stats.misses,
            joins = self.stats.joins,
            "Shutdown"
        );
    }

    fn start(
        &mut self,
        key: RequestKey,
        waiters: Vec<Response<Value>>,
        upstream: &Arc<dyn ResourceFetcher>,
        refresh: bool,
    ) {
        let Some(sender) = self.sender.upgrade() else {
            warn!(%key, "No clients left, not starting fetch");
            for waiter in waiters {
                let _ = waiter.send(Err(FetchError::CacheClosed));
            }
            return;
        };

        self.pending.insert(key.clone(), waiters);
        let upstream = upstream.clone();
        tokio::spawn(async move {
            let call = async {
                if refresh {
                    upstream.refresh(&key).await
                } else {
                    upstream.fetch(&key).await
                }
            };
            // A panicking upstream must still settle the entry, or its waiters hang.
            let result = AssertUnwindSafe(call).catch_unwind().await.unwrap_or_else(|_| {
                error!(%key, "Upstream fetch panicked");
                Err(FetchError::network(&key, "upstream fetch panicked"))
            });
            let _ = sender.send(CacheRequest::Settled { key, result }).await;
        });
    }

    fn settle(&mut self, key: RequestKey, result: Result<Value, FetchError>) {
        let waiters = self.pending.remove(&key).unwrap_or_default();
        match result {
            Ok(value) => {
                if self.store_values {
                    self.store.insert(key.clone(), CachedValue::new(value.clone()));
                }
                debug!(%key, waiters = waiters.len(), "Resolved");
                for waiter in waiters {
                    let _ = waiter.send(Ok(value.clone()));
                }
            }
            Err(e) => {
                warn!(%key, error = %e, waiters = waiters.len(), "Fetch failed, entry dropped");
                for waiter in waiters {
                    let _ = waiter.send(Err(e.clone()));
                }
            }
        }
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            entries: self.store.len(),
            in_flight: self.pending.len(),
            ..self.stats
        }
    }
}
