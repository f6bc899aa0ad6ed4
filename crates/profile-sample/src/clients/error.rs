//! Error types for profile operations.

use async_resource::FetchError;
use thiserror::Error;

/// Errors that can occur while loading profile data.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProfileError {
    /// The requested user does not exist.
    #[error("User not found: {0}")]
    NotFound(String),

    /// The API answered with data of an unexpected shape.
    #[error("Invalid profile data: {0}")]
    InvalidData(String),

    /// The API or the cache could not be reached.
    #[error("Profile service unavailable: {0}")]
    Unavailable(String),
}

impl From<FetchError> for ProfileError {
    fn from(err: FetchError) -> Self {
        match &err {
            FetchError::Response { key, status: 404 } => ProfileError::NotFound(key.to_string()),
            FetchError::Parse { .. } => ProfileError::InvalidData(err.to_string()),
            _ => ProfileError::Unavailable(err.to_string()),
        }
    }
}
