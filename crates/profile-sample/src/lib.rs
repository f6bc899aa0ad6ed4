//! # Profile Sample Library
//!
//! A user-profile page built on `async_resource`: the user and their friends
//! load in parallel, and a friend's details are prefetched on hover so the
//! click that follows finds them already cached.
//!
//! This library exposes the modules of the demo for integration testing.

pub mod clients;
pub mod lifecycle;
pub mod model;
