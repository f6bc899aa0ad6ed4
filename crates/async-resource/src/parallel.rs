//! # Parallel Coordinator
//!
//! Starts a fixed, ordered set of independent requests at the same time and
//! joins them all-or-nothing.
//!
//! - Every call is issued when the coordinator is invoked; none is started
//!   lazily or after another one finishes.
//! - The composite succeeds only if every call succeeds. Results come back in
//!   key order and are deserialized into one composite value, such as a tuple
//!   `(User, Vec<User>)` or a `Vec<T>`.
//! - The first call to fail fails the whole join with its error. Siblings
//!   still in flight are dropped and their results ignored; nothing is rolled
//!   back or retried.
//!
//! [`fetch_parallel`] is the one-shot join. [`ParallelResource`] wraps it in
//! an observable handle that tracks one status slot per key and restarts all
//! slots together when re-invoked.

use crate::error::{ErrorInfo, FetchError};
use crate::fetcher::{decode, ResourceFetcher};
use crate::key::RequestKey;
use crate::state::{AsyncStatus, Phase};
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

/// Issues every request concurrently and joins them all-or-nothing.
///
/// The composite type `C` is deserialized from the JSON array of results, so
/// any sequence-shaped type works. A tuple whose arity differs from the number
/// of keys fails with [`FetchError::Parse`].
#[instrument(skip(fetcher, keys), fields(count = keys.len()))]
pub async fn fetch_parallel<C: DeserializeOwned>(
    fetcher: &dyn ResourceFetcher,
    keys: &[RequestKey],
) -> Result<C, FetchError> {
    let values = try_join_all(keys.iter().map(|key| fetcher.fetch(key))).await?;
    decode_composite(keys, values)
}

fn decode_composite<C: DeserializeOwned>(
    keys: &[RequestKey],
    values: Vec<Value>,
) -> Result<C, FetchError> {
    let joined = keys
        .iter()
        .map(RequestKey::as_str)
        .collect::<Vec<_>>()
        .join(",");
    decode(&RequestKey::from(format!("[{}]", joined)), Value::Array(values))
}

/// Snapshot of a [`ParallelResource`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelState<C> {
    pub keys: Vec<RequestKey>,
    /// Per-key status, in key order.
    pub slots: Vec<AsyncStatus>,
    pub phase: Phase<C>,
}

impl<C> ParallelState<C> {
    fn idle(keys: Vec<RequestKey>) -> Self {
        let slots = vec![AsyncStatus::Idle; keys.len()];
        Self {
            keys,
            slots,
            phase: Phase::Idle,
        }
    }

    /// The composite status: error wins over loading, success needs every slot.
    pub fn status(&self) -> AsyncStatus {
        self.phase.status()
    }

    pub fn data(&self) -> Option<&C> {
        self.phase.data()
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.phase.error()
    }
}

struct Inner<C> {
    fetcher: Arc<dyn ResourceFetcher>,
    state: watch::Sender<ParallelState<C>>,
    generation: AtomicU64,
}

/// Observable all-or-nothing join over a fixed ordered set of keys.
pub struct ParallelResource<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for ParallelResource<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C> ParallelResource<C>
where
    C: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new<K: Into<RequestKey>>(
        fetcher: Arc<dyn ResourceFetcher>,
        keys: impl IntoIterator<Item = K>,
    ) -> Self {
        let keys = keys.into_iter().map(Into::into).collect();
        let (state, _) = watch::channel(ParallelState::idle(keys));
        Self {
            inner: Arc::new(Inner {
                fetcher,
                state,
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> ParallelState<C> {
        self.inner.state.borrow().clone()
    }

    pub fn status(&self) -> AsyncStatus {
        self.inner.state.borrow().status()
    }

    pub fn keys(&self) -> Vec<RequestKey> {
        self.inner.state.borrow().keys.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ParallelState<C>> {
        self.inner.state.subscribe()
    }

    /// Starts all calls unless a join is already loading.
    pub async fn fetch(&self) -> ParallelState<C> {
        match self.begin(false, None) {
            Some((generation, keys)) => self.run(generation, keys, false).await,
            None => self.state(),
        }
    }

    /// Restarts all calls regardless of the current status.
    pub async fn refetch(&self) -> ParallelState<C> {
        match self.begin(true, None) {
            Some((generation, keys)) => self.run(generation, keys, true).await,
            None => self.state(),
        }
    }

    /// Replaces the key set and restarts every slot together.
    ///
    /// Passing the same keys again is a no-op.
    pub async fn set_keys<K: Into<RequestKey>>(
        &self,
        keys: impl IntoIterator<Item = K>,
    ) -> ParallelState<C> {
        let keys: Vec<RequestKey> = keys.into_iter().map(Into::into).collect();
        match self.begin(true, Some(keys)) {
            Some((generation, keys)) => self.run(generation, keys, false).await,
            None => self.state(),
        }
    }

    fn begin(&self, force: bool, new_keys: Option<Vec<RequestKey>>) -> Option<(u64, Vec<RequestKey>)> {
        let mut started = None;
        self.inner.state.send_if_modified(|state| {
            match new_keys {
                Some(keys) if keys != state.keys => state.keys = keys,
                Some(_) => return false,
                None if !force && state.phase.is_loading() => return false,
                None => {}
            }
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            state.slots = vec![AsyncStatus::Loading; state.keys.len()];
            state.phase = Phase::Loading;
            started = Some((generation, state.keys.clone()));
            true
        });
        if let Some((generation, ref keys)) = started {
            debug!(generation, count = keys.len(), "Loading all slots");
        }
        started
    }

    async fn run(&self, generation: u64, keys: Vec<RequestKey>, refresh: bool) -> ParallelState<C> {
        let fetcher = self.inner.fetcher.as_ref();
        let calls = keys.iter().enumerate().map(|(slot, key)| async move {
            let result = if refresh {
                fetcher.refresh(key).await
            } else {
                fetcher.fetch(key).await
            };
            self.mark_slot(generation, slot, &result);
            result
        });

        let phase = match try_join_all(calls).await {
            Ok(values) => Phase::from(decode_composite::<C>(&keys, values)),
            Err(e) => {
                warn!(generation, error = %e, "Parallel fetch failed");
                Phase::Error(ErrorInfo::from(e))
            }
        };

        let committed = self.inner.state.send_if_modified(|state| {
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            // Siblings abandoned by a failed join never settle.
            for slot in state.slots.iter_mut() {
                if *slot == AsyncStatus::Loading {
                    *slot = AsyncStatus::Idle;
                }
            }
            state.phase = phase;
            true
        });

        if committed {
            debug!(generation, status = ?self.status(), "Join settled");
        } else {
            debug!(generation, "Discarding stale join");
        }
        self.state()
    }

    fn mark_slot(&self, generation: u64, slot: usize, result: &Result<Value, FetchError>) {
        self.inner.state.send_if_modified(|state| {
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            let status = match result {
                Ok(_) => AsyncStatus::Success,
                Err(_) => AsyncStatus::Error,
            };
            state.slots[slot] = status;
            // Fail fast: the composite is an error before siblings settle.
            if let (Err(e), false) = (result, matches!(state.phase, Phase::Error(_))) {
                state.phase = Phase::Error(ErrorInfo::from(e.clone()));
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockFetcher;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct User {
        id: String,
        name: String,
    }

    fn keys(list: &[&str]) -> Vec<RequestKey> {
        list.iter().map(|k| RequestKey::from(*k)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_succeed_in_key_order() {
        let mock = MockFetcher::new();
        mock.expect("/users/u1")
            .after(Duration::from_millis(30))
            .return_ok(json!({"id": "u1", "name": "Juntao Qiu"}));
        mock.expect("/users/u1/friends")
            .after(Duration::from_millis(10))
            .return_ok(json!([{"id": "u2", "name": "Alice"}]));

        let (user, friends): (User, Vec<User>) =
            fetch_parallel(&mock, &keys(&["/users/u1", "/users/u1/friends"]))
                .await
                .unwrap();
        assert_eq!(user.name, "Juntao Qiu");
        assert_eq!(friends[0].id, "u2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_start_together() {
        let mock = MockFetcher::new();
        for key in ["/a", "/b", "/c"] {
            mock.expect(key)
                .after(Duration::from_millis(100))
                .return_ok(json!(key));
        }

        let start = tokio::time::Instant::now();
        let values: Vec<String> = fetch_parallel(&mock, &keys(&["/a", "/b", "/c"]))
            .await
            .unwrap();
        assert_eq!(values, vec!["/a", "/b", "/c"]);
        // Sequential calls would take 300ms.
        assert!(start.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_failure_wins() {
        let mock = MockFetcher::new();
        mock.expect("/a")
            .after(Duration::from_millis(10))
            .return_ok(json!(1));
        mock.expect("/b")
            .after(Duration::from_millis(30))
            .return_err(FetchError::response("/b", 404));
        mock.expect("/c")
            .after(Duration::from_millis(20))
            .return_err(FetchError::response("/c", 500));

        let err = fetch_parallel::<Vec<i64>>(&mock, &keys(&["/a", "/b", "/c"]))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arity_mismatch_is_parse_error() {
        let mock = MockFetcher::new();
        mock.expect("/a").return_ok(json!(1));

        let err = fetch_parallel::<(i64, i64)>(&mock, &keys(&["/a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resource_error_before_siblings_settle() {
        let mock = Arc::new(MockFetcher::new());
        mock.expect("/slow")
            .after(Duration::from_millis(100))
            .return_ok(json!(1));
        mock.expect("/broken")
            .after(Duration::from_millis(10))
            .return_err(FetchError::response("/broken", 502));

        let resource = ParallelResource::<(i64, i64)>::new(mock.clone(), ["/slow", "/broken"]);
        let state = resource.fetch().await;

        assert_eq!(state.status(), AsyncStatus::Error);
        assert_eq!(state.error().unwrap().status(), Some(502));
        assert_eq!(state.slots, vec![AsyncStatus::Idle, AsyncStatus::Error]);
        assert!(state.data().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_keys_restarts_every_slot() {
        let mock = Arc::new(MockFetcher::new());
        mock.expect("/users/u1").return_ok(json!({"id": "u1", "name": "Juntao Qiu"}));
        mock.expect("/users/u1/friends").return_ok(json!([]));
        mock.expect("/users/u2").return_ok(json!({"id": "u2", "name": "Alice"}));
        mock.expect("/users/u2/friends").return_ok(json!([]));

        let resource =
            ParallelResource::<(User, Vec<User>)>::new(mock.clone(), ["/users/u1", "/users/u1/friends"]);
        assert_eq!(resource.fetch().await.status(), AsyncStatus::Success);

        let state = resource.set_keys(["/users/u2", "/users/u2/friends"]).await;
        assert_eq!(state.data().unwrap().0.name, "Alice");
        assert_eq!(state.slots, vec![AsyncStatus::Success; 2]);

        // Same keys again: nothing new is issued.
        resource.set_keys(["/users/u2", "/users/u2/friends"]).await;
        assert_eq!(mock.total_calls(), 4);
        mock.verify();
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_keys_restarts_unchanged_slots_too() {
        let mock = Arc::new(MockFetcher::new());
        mock.expect("/a").return_ok(json!(1));
        mock.expect("/b").return_ok(json!(2));
        mock.expect("/a").return_ok(json!(10));
        mock.expect("/c").return_ok(json!(3));

        let resource = ParallelResource::<Vec<i64>>::new(mock.clone(), ["/a", "/b"]);
        assert_eq!(resource.fetch().await.data(), Some(&vec![1, 2]));

        // Only the second key changes, yet "/a" is requested again.
        let state = resource.set_keys(["/a", "/c"]).await;
        assert_eq!(state.data(), Some(&vec![10, 3]));
        assert_eq!(mock.calls("/a"), 2);
        assert_eq!(mock.calls("/b"), 1);
        mock.verify();
    }

    #[tokio::test(start_paused = true)]
    async fn test_resource_fetch_while_loading_is_noop() {
        let mock = Arc::new(MockFetcher::new());
        mock.expect("/a")
            .after(Duration::from_millis(50))
            .return_ok(json!(1));
        mock.expect("/b")
            .after(Duration::from_millis(50))
            .return_ok(json!(2));

        let resource = ParallelResource::<Vec<i64>>::new(mock.clone(), ["/a", "/b"]);
        let first = {
            let resource = resource.clone();
            tokio::spawn(async move { resource.fetch().await })
        };
        let mut rx = resource.subscribe();
        rx.wait_for(|s| s.status() == AsyncStatus::Loading).await.unwrap();

        for _ in 0..3 {
            assert_eq!(resource.fetch().await.status(), AsyncStatus::Loading);
        }
        assert_eq!(mock.total_calls(), 2);

        let state = first.await.unwrap();
        assert_eq!(state.data(), Some(&vec![1, 2]));
        assert_eq!(mock.total_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_join_is_discarded() {
        let mock = Arc::new(MockFetcher::new());
        mock.expect("/old")
            .after(Duration::from_millis(100))
            .return_ok(json!(1));
        mock.expect("/new")
            .after(Duration::from_millis(10))
            .return_ok(json!(2));

        let resource = ParallelResource::<Vec<i64>>::new(mock.clone(), ["/old"]);
        let old = {
            let resource = resource.clone();
            tokio::spawn(async move { resource.fetch().await })
        };
        let mut rx = resource.subscribe();
        rx.wait_for(|s| s.status() == AsyncStatus::Loading).await.unwrap();

        let state = resource.set_keys(["/new"]).await;
        assert_eq!(state.data(), Some(&vec![2]));

        let after_old = old.await.unwrap();
        assert_eq!(after_old.data(), Some(&vec![2]));
    }
}
