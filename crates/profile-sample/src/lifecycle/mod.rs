//! # Lifecycle
//!
//! Wires the profile demo together and tears it down again.
//!
//! The prefetch cache is created without its upstream and receives it when it
//! starts running, so tests can swap the HTTP fetcher for a
//! [`MockFetcher`](async_resource::mock::MockFetcher) without touching
//! anything else.
//!
//! ## Graceful Shutdown
//!
//! 1. **Drop all clients** - every resource and the [`ProfileClient`](crate::clients::ProfileClient)
//!    hold a sender to the cache
//! 2. **Cache detects closure** - its receive loop ends
//! 3. **Await completion** - [`ProfileSystem::shutdown`] waits for the cache task
//!
//! Resources handed out by the client keep the cache alive, so drop them
//! before calling `shutdown` or it will wait for them.

pub mod profile_system;

pub use profile_system::*;
