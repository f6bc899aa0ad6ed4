//! Domain-specific wrappers around the prefetch cache client.

pub mod error;
pub mod profile_client;

pub use error::*;
pub use profile_client::*;
