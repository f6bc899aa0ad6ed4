//! # Observability & Tracing
//!
//! Every layer logs through `tracing` with structured fields:
//!
//! - **Fetcher**: one `debug` event per GET with the URL, `warn` on failures.
//! - **State handles**: `debug` on every transition, including discarded stale
//!   responses, with the request generation.
//! - **Prefetch cache**: `info` on start and shutdown (with hit/miss/join
//!   totals), `debug` for each hit, miss, join and prefetch.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Cache lifecycle and failures only
//! RUST_LOG=info cargo run
//!
//! # Every request and state transition
//! RUST_LOG=debug cargo run
//!
//! # Just the cache
//! RUST_LOG=async_resource::cache=debug cargo run
//! ```
//!
//! With `RUST_LOG=debug` a hover prefetch followed by a click reads:
//!
//! ```text
//! DEBUG Prefetch key="/users/u2"
//! DEBUG fetch{key=/users/u2}: GET url="http://localhost:8080/users/u2"
//! DEBUG get_or_fetch{key=/users/u2}: Joined in-flight request key="/users/u2" waiters=1
//! DEBUG Resolved key="/users/u2" waiters=1
//! ```

/// Initializes the global subscriber, filtered by `RUST_LOG`.
///
/// Call once, at the start of `main`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
