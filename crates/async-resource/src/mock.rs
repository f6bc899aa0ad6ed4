//! # Mock Fetcher & Testing Guide
//!
//! [`MockFetcher`] implements [`ResourceFetcher`] entirely in memory. Tests
//! script what each key answers, after how long, and then assert how many
//! network calls were really made. Nothing touches the network, and with
//! `#[tokio::test(start_paused = true)]` the delays cost no wall-clock time.
//!
//! ## When to use the Mock vs a real server
//!
//! | Feature | MockFetcher | HttpFetcher + local server |
//! |---------|-------------|----------------------------|
//! | **Speed** | Instant (paused clock) | Real sockets |
//! | **Timing control** | Exact per-response delays | Scheduler dependent |
//! | **Call counting** | Built in | Manual |
//! | **Use Case** | State machines, cache dedup, join ordering | Status and body mapping |
//!
//! ## Example
//!
//! ```rust
//! use async_resource::mock::MockFetcher;
//! use async_resource::{AsyncResource, AsyncStatus, FetchError};
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = Arc::new(MockFetcher::new());
//!     mock.expect("/users/u1")
//!         .after(Duration::from_millis(10))
//!         .return_ok(json!({"id": "u1"}));
//!     mock.expect("/users/u2")
//!         .return_err(FetchError::response("/users/u2", 404));
//!
//!     let user = AsyncResource::<serde_json::Value>::new(mock.clone(), "/users/u1");
//!     assert_eq!(user.fetch().await.status(), AsyncStatus::Success);
//!
//!     assert_eq!(mock.calls("/users/u1"), 1);
//! }
//! ```
//!
//! Expectations for the same key are answered in the order they were
//! registered. A request with no expectation left fails with a
//! [`FetchError::Network`] so the test sees it as an error state instead of
//! hanging.

use crate::error::FetchError;
use crate::fetcher::ResourceFetcher;
use crate::key::RequestKey;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// A scripted answer for one request.
struct Expectation {
    delay: Duration,
    response: Result<Value, FetchError>,
}

#[derive(Default)]
struct MockState {
    expectations: HashMap<RequestKey, VecDeque<Expectation>>,
    calls: HashMap<RequestKey, usize>,
    refreshes: HashMap<RequestKey, usize>,
}

/// An in-memory [`ResourceFetcher`] with expectation tracking.
#[derive(Default)]
pub struct MockFetcher {
    state: Arc<Mutex<MockState>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts scripting the next answer for `key`.
    pub fn expect(&self, key: impl Into<RequestKey>) -> ExpectationBuilder {
        ExpectationBuilder {
            key: key.into(),
            delay: Duration::ZERO,
            state: self.state.clone(),
        }
    }

    /// Number of requests made for `key`, through `fetch` or `refresh`.
    pub fn calls(&self, key: impl Into<RequestKey>) -> usize {
        self.lock().calls.get(&key.into()).copied().unwrap_or(0)
    }

    /// Number of those requests that came through `refresh`.
    pub fn refreshes(&self, key: impl Into<RequestKey>) -> usize {
        self.lock().refreshes.get(&key.into()).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Panics if any scripted answer was never requested.
    pub fn verify(&self) {
        let state = self.lock();
        let remaining: usize = state.expectations.values().map(VecDeque::len).sum();
        if remaining > 0 {
            panic!("Not all expectations were met. {} remaining", remaining);
        }
    }

    async fn answer(&self, key: &RequestKey, refresh: bool) -> Result<Value, FetchError> {
        let next = {
            let mut state = self.lock();
            *state.calls.entry(key.clone()).or_default() += 1;
            if refresh {
                *state.refreshes.entry(key.clone()).or_default() += 1;
            }
            state.expectations.get_mut(key).and_then(VecDeque::pop_front)
        };

        let Some(expectation) = next else {
            debug!(%key, "No expectation registered");
            return Err(FetchError::network(key, "no expectation registered"));
        };

        if !expectation.delay.is_zero() {
            tokio::time::sleep(expectation.delay).await;
        }
        debug!(%key, ok = expectation.response.is_ok(), "Mock answered");
        expectation.response
    }
}

#[async_trait]
impl ResourceFetcher for MockFetcher {
    async fn fetch(&self, key: &RequestKey) -> Result<Value, FetchError> {
        self.answer(key, false).await
    }

    async fn refresh(&self, key: &RequestKey) -> Result<Value, FetchError> {
        self.answer(key, true).await
    }
}

/// Builder for one scripted answer.
pub struct ExpectationBuilder {
    key: RequestKey,
    delay: Duration,
    state: Arc<Mutex<MockState>>,
}

impl ExpectationBuilder {
    /// Settles the request only after `delay` has elapsed.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn return_ok(self, value: Value) {
        self.push(Ok(value));
    }

    pub fn return_err(self, error: FetchError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<Value, FetchError>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .expectations
            .entry(self.key)
            .or_default()
            .push_back(Expectation {
                delay: self.delay,
                response,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_mock_answers_in_order_and_counts() {
        let mock = MockFetcher::new();
        mock.expect("/a").return_ok(json!(1));
        mock.expect("/a").after(Duration::from_millis(5)).return_ok(json!(2));

        let key = RequestKey::from("/a");
        assert_eq!(mock.fetch(&key).await, Ok(json!(1)));
        assert_eq!(mock.refresh(&key).await, Ok(json!(2)));
        assert_eq!(mock.calls("/a"), 2);
        assert_eq!(mock.refreshes("/a"), 1);
        mock.verify();
    }

    #[tokio::test]
    async fn test_unexpected_request_is_network_error() {
        let mock = MockFetcher::new();
        let err = mock.fetch(&RequestKey::from("/missing")).await.unwrap_err();
        assert!(err.is_network());
    }
}
