//! # Async Resource State
//!
//! [`AsyncResource`] owns the `idle | loading | success | error` state of one
//! resource and exposes the imperative `fetch` / `refetch` operations.
//!
//! ## State Machine
//!
//! ```text
//! idle ──fetch()──▶ loading ──ok──▶ success
//!                     │   ▲             │
//!                   error └─refetch()───┘
//!                     ▼   ▲
//!                   error ┘ (refetch)
//! ```
//!
//! A key change from any state forces `loading` with data and error cleared.
//! There is no terminal state.
//!
//! ## Stale Discard
//!
//! Every transition into `loading` bumps a generation counter while holding
//! the state lock. A completed request commits only if its generation is
//! still the current one, so a slow response for an old key can never
//! overwrite the state of a newer request, whatever order they finish in.
//!
//! ## Observing
//!
//! Observers register with [`AsyncResource::subscribe`] and receive a
//! [`watch`] receiver that is notified on every committed transition.

use crate::error::ErrorInfo;
use crate::fetcher::{fetch_as, refresh_as, ResourceFetcher};
use crate::key::RequestKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Discriminant of a [`Phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsyncStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Where a resource is in its lifecycle.
///
/// Data only exists in `Success` and the error only in `Error`, so the two
/// can never be observed together.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase<T> {
    Idle,
    Loading,
    Success(T),
    Error(ErrorInfo),
}

impl<T> Phase<T> {
    pub fn status(&self) -> AsyncStatus {
        match self {
            Phase::Idle => AsyncStatus::Idle,
            Phase::Loading => AsyncStatus::Loading,
            Phase::Success(_) => AsyncStatus::Success,
            Phase::Error(_) => AsyncStatus::Error,
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Phase::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            Phase::Error(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Phase::Loading)
    }
}

impl<T, E: Into<ErrorInfo>> From<Result<T, E>> for Phase<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Phase::Success(data),
            Err(e) => Phase::Error(e.into()),
        }
    }
}

/// Snapshot of an [`AsyncResource`].
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncState<T> {
    pub key: RequestKey,
    pub phase: Phase<T>,
}

impl<T> AsyncState<T> {
    pub fn idle(key: RequestKey) -> Self {
        Self {
            key,
            phase: Phase::Idle,
        }
    }

    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn status(&self) -> AsyncStatus {
        self.phase.status()
    }

    pub fn data(&self) -> Option<&T> {
        self.phase.data()
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.phase.error()
    }
}

/// Whether `refetch()` must go past a fresh cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefetchPolicy {
    /// Always ask the fetcher to refresh.
    #[default]
    Always,
    /// Let a caching fetcher answer from a fresh entry.
    PreferCached,
}

/// How a new request was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Fetch,
    Refetch,
    KeyChange,
}

struct Inner<T> {
    fetcher: Arc<dyn ResourceFetcher>,
    state: watch::Sender<AsyncState<T>>,
    /// Bumped only inside `send_if_modified`, i.e. under the state lock.
    generation: AtomicU64,
    refetch_policy: RefetchPolicy,
}

/// Stateful handle for one resource.
///
/// Cloning the handle shares the state; every clone observes the same
/// transitions. At most one request is logically in flight per handle.
pub struct AsyncResource<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for AsyncResource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> AsyncResource<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Creates an idle handle bound to `key`. Nothing is fetched yet.
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, key: impl Into<RequestKey>) -> Self {
        Self::with_policy(fetcher, key, RefetchPolicy::default())
    }

    pub fn with_policy(
        fetcher: Arc<dyn ResourceFetcher>,
        key: impl Into<RequestKey>,
        refetch_policy: RefetchPolicy,
    ) -> Self {
        let (state, _) = watch::channel(AsyncState::idle(key.into()));
        Self {
            inner: Arc::new(Inner {
                fetcher,
                state,
                generation: AtomicU64::new(0),
                refetch_policy,
            }),
        }
    }

    pub fn state(&self) -> AsyncState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn status(&self) -> AsyncStatus {
        self.inner.state.borrow().status()
    }

    pub fn key(&self) -> RequestKey {
        self.inner.state.borrow().key.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AsyncState<T>> {
        self.inner.state.subscribe()
    }

    /// Starts a request unless one is already loading.
    ///
    /// Resolves once the request settles (or immediately, for the no-op case)
    /// and returns the state as it is at that point.
    pub async fn fetch(&self) -> AsyncState<T> {
        match self.begin(Trigger::Fetch, None) {
            Some((generation, key)) => self.complete(generation, key, Trigger::Fetch).await,
            None => {
                debug!(key = %self.key(), "Fetch ignored, already loading");
                self.state()
            }
        }
    }

    /// Starts a new request regardless of the current status.
    ///
    /// A request still in flight is superseded; its result will be discarded.
    pub async fn refetch(&self) -> AsyncState<T> {
        match self.begin(Trigger::Refetch, None) {
            Some((generation, key)) => self.complete(generation, key, Trigger::Refetch).await,
            None => self.state(),
        }
    }

    /// Rebinds the handle to `key` and runs exactly one fetch cycle for it.
    ///
    /// Setting the key the handle already holds is a no-op.
    pub async fn set_key(&self, key: impl Into<RequestKey>) -> AsyncState<T> {
        match self.begin(Trigger::KeyChange, Some(key.into())) {
            Some((generation, key)) => self.complete(generation, key, Trigger::KeyChange).await,
            None => self.state(),
        }
    }

    /// [`fetch`](Self::fetch) on a background task, for synchronous triggers.
    pub fn spawn_fetch(&self) -> JoinHandle<AsyncState<T>> {
        let this = self.clone();
        tokio::spawn(async move { this.fetch().await })
    }

    /// [`refetch`](Self::refetch) on a background task.
    pub fn spawn_refetch(&self) -> JoinHandle<AsyncState<T>> {
        let this = self.clone();
        tokio::spawn(async move { this.refetch().await })
    }

    /// Transitions to `Loading` and claims a new generation, or returns `None`
    /// when the trigger does not start a request.
    fn begin(&self, trigger: Trigger, new_key: Option<RequestKey>) -> Option<(u64, RequestKey)> {
        let mut started = None;
        self.inner.state.send_if_modified(|state| {
            match trigger {
                Trigger::Fetch if state.phase.is_loading() => return false,
                Trigger::KeyChange => match new_key {
                    Some(ref key) if *key != state.key => state.key = key.clone(),
                    _ => return false,
                },
                _ => {}
            }
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            state.phase = Phase::Loading;
            started = Some((generation, state.key.clone()));
            true
        });
        if let Some((generation, ref key)) = started {
            debug!(%key, generation, ?trigger, "Loading");
        }
        started
    }

    async fn complete(&self, generation: u64, key: RequestKey, trigger: Trigger) -> AsyncState<T> {
        let fetcher = self.inner.fetcher.as_ref();
        let result = match (trigger, self.inner.refetch_policy) {
            (Trigger::Refetch, RefetchPolicy::Always) => refresh_as::<T>(fetcher, &key).await,
            _ => fetch_as::<T>(fetcher, &key).await,
        };

        if let Err(ref e) = result {
            warn!(%key, generation, error = %e, "Fetch failed");
        }

        let committed = self.inner.state.send_if_modified(|state| {
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            state.phase = Phase::from(result);
            true
        });

        if committed {
            debug!(%key, generation, status = ?self.status(), "Settled");
        } else {
            debug!(%key, generation, "Discarding stale response");
        }
        self.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::mock::MockFetcher;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct User {
        id: String,
        name: String,
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_transitions_idle_loading_success() {
        let mock = Arc::new(MockFetcher::new());
        mock.expect("/users/u1")
            .after(Duration::from_millis(50))
            .return_ok(json!({"id": "u1", "name": "Juntao Qiu"}));

        let resource = AsyncResource::<User>::new(mock.clone(), "/users/u1");
        assert_eq!(resource.status(), AsyncStatus::Idle);

        let mut rx = resource.subscribe();
        let task = resource.spawn_fetch();

        rx.wait_for(|s| s.status() == AsyncStatus::Loading).await.unwrap();
        assert!(resource.state().data().is_none());
        assert!(resource.state().error().is_none());

        let state = task.await.unwrap();
        assert_eq!(state.status(), AsyncStatus::Success);
        assert_eq!(state.data().unwrap().name, "Juntao Qiu");
        assert!(state.error().is_none());
        mock.verify();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_while_loading_is_noop() {
        let mock = Arc::new(MockFetcher::new());
        mock.expect("/users/u1")
            .after(Duration::from_millis(50))
            .return_ok(json!({"id": "u1", "name": "Juntao Qiu"}));

        let resource = AsyncResource::<User>::new(mock.clone(), "/users/u1");
        let first = resource.spawn_fetch();
        let mut rx = resource.subscribe();
        rx.wait_for(|s| s.status() == AsyncStatus::Loading).await.unwrap();

        for _ in 0..3 {
            let state = resource.fetch().await;
            assert_eq!(state.status(), AsyncStatus::Loading);
        }

        first.await.unwrap();
        assert_eq!(mock.calls("/users/u1"), 1);
        assert_eq!(resource.status(), AsyncStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_sets_error_and_clears_data() {
        let mock = Arc::new(MockFetcher::new());
        mock.expect("/users/u1").return_ok(json!({"id": "u1", "name": "Juntao Qiu"}));
        mock.expect("/users/u1")
            .return_err(FetchError::response("/users/u1", 503));

        let resource = AsyncResource::<User>::new(mock.clone(), "/users/u1");
        assert_eq!(resource.fetch().await.status(), AsyncStatus::Success);

        let state = resource.refetch().await;
        assert_eq!(state.status(), AsyncStatus::Error);
        assert!(state.data().is_none());
        assert_eq!(state.error().unwrap().status(), Some(503));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_recovers_from_error() {
        let mock = Arc::new(MockFetcher::new());
        mock.expect("/users/u1")
            .return_err(FetchError::network("/users/u1", "connection refused"));
        mock.expect("/users/u1").return_ok(json!({"id": "u1", "name": "Juntao Qiu"}));

        let resource = AsyncResource::<User>::new(mock.clone(), "/users/u1");
        assert_eq!(resource.fetch().await.status(), AsyncStatus::Error);

        // fetch() is allowed from error too, but refetch() is the retry path.
        let state = resource.spawn_refetch().await.unwrap();
        assert_eq!(state.status(), AsyncStatus::Success);
        assert!(state.error().is_none());
        assert_eq!(mock.refreshes("/users/u1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_change_discards_stale_response() {
        let mock = Arc::new(MockFetcher::new());
        mock.expect("/users/u1")
            .after(Duration::from_millis(100))
            .return_ok(json!({"id": "u1", "name": "Juntao Qiu"}));
        mock.expect("/users/u2")
            .after(Duration::from_millis(10))
            .return_ok(json!({"id": "u2", "name": "Alice"}));

        let resource = AsyncResource::<User>::new(mock.clone(), "/users/u1");
        let old = resource.spawn_fetch();
        let mut rx = resource.subscribe();
        rx.wait_for(|s| s.status() == AsyncStatus::Loading).await.unwrap();

        let state = resource.set_key("/users/u2").await;
        assert_eq!(state.data().unwrap().id, "u2");

        // The old request settles later and must not overwrite u2.
        let after_old = old.await.unwrap();
        assert_eq!(after_old.key().as_str(), "/users/u2");
        assert_eq!(after_old.data().unwrap().id, "u2");
        assert_eq!(resource.state().data().unwrap().name, "Alice");
        mock.verify();
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_is_noop() {
        let mock = Arc::new(MockFetcher::new());
        let resource = AsyncResource::<User>::new(mock.clone(), "/users/u1");

        let state = resource.set_key("/users/u1").await;
        assert_eq!(state.status(), AsyncStatus::Idle);
        assert_eq!(mock.calls("/users/u1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_error_surfaces_as_error_info() {
        let mock = Arc::new(MockFetcher::new());
        mock.expect("/users/u1").return_ok(json!(["not", "a", "user"]));

        let resource = AsyncResource::<User>::new(mock.clone(), "/users/u1");
        let state = resource.fetch().await;
        let info = state.error().unwrap();
        assert!(matches!(info.cause, Some(FetchError::Parse { .. })));
    }
}
