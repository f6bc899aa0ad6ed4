//! # Entry Storage
//!
//! Resolved cache entries live behind the [`EntryStore`] trait so the storage
//! medium can be swapped. [`MemoryStore`] is the default, an in-process
//! `mini_moka` cache that enforces the configured TTL and capacity.
//! Pending entries never reach the store; the actor tracks them itself.

use crate::config::{CacheConfig, Ttl};
use crate::key::RequestKey;
use mini_moka::sync::Cache;
use serde_json::Value;
use std::time::SystemTime;

/// A resolved fetch result.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    pub value: Value,
    pub fetched_at: SystemTime,
}

impl CachedValue {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            fetched_at: SystemTime::now(),
        }
    }
}

/// Storage for resolved entries.
///
/// `get` must only return entries that are still fresh under the store's
/// freshness policy.
pub trait EntryStore: Send + 'static {
    fn get(&mut self, key: &RequestKey) -> Option<CachedValue>;
    fn insert(&mut self, key: RequestKey, value: CachedValue);
    /// Returns whether a fresh entry was removed.
    fn invalidate(&mut self, key: &RequestKey) -> bool;
    fn clear(&mut self);
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`EntryStore`] with TTL expiry and optional capacity bound.
///
/// Entry counts reported by [`len`](EntryStore::len) are approximate: expired
/// entries are purged lazily.
pub struct MemoryStore {
    inner: Cache<RequestKey, CachedValue>,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        let mut builder = Cache::builder();
        if let Ttl::Finite(ttl) = config.ttl {
            if !ttl.is_zero() {
                builder = builder.time_to_live(ttl);
            }
        }
        if let Some(max) = config.max_entries {
            builder = builder.max_capacity(max);
        }
        Self {
            inner: builder.build(),
        }
    }
}

impl EntryStore for MemoryStore {
    fn get(&mut self, key: &RequestKey) -> Option<CachedValue> {
        self.inner.get(key)
    }

    fn insert(&mut self, key: RequestKey, value: CachedValue) {
        self.inner.insert(key, value);
    }

    fn invalidate(&mut self, key: &RequestKey) -> bool {
        let existed = self.inner.get(key).is_some();
        self.inner.invalidate(key);
        existed
    }

    fn clear(&mut self) {
        self.inner.invalidate_all();
    }

    fn len(&self) -> u64 {
        self.inner.entry_count()
    }
}
