//! # Fetch Errors
//!
//! This module defines the error types shared by every layer of the crate.
//! The fetcher produces a [`FetchError`]; the state handles and the parallel
//! coordinator surface it to observers as an [`ErrorInfo`]. Nothing in the
//! crate retries on its own: a failed resource stays failed until the caller
//! asks for a `refetch()`.

use crate::key::RequestKey;
use thiserror::Error;

/// Errors that can occur while fetching a resource.
///
/// The type is `Clone` so that one failure can be handed to every caller
/// that was waiting on the same in-flight request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// No response was obtained (connection refused, DNS failure, timeout, ...).
    #[error("Network error for {key}: {message}")]
    Network { key: RequestKey, message: String },

    /// A response arrived but its status was not successful.
    #[error("Request for {key} failed with status {status}")]
    Response { key: RequestKey, status: u16 },

    /// The response body could not be parsed into the expected shape.
    #[error("Failed to parse response for {key}: {message}")]
    Parse { key: RequestKey, message: String },

    /// The prefetch cache actor is no longer running.
    #[error("Prefetch cache closed")]
    CacheClosed,
}

impl FetchError {
    pub fn network(key: impl Into<RequestKey>, message: impl Into<String>) -> Self {
        FetchError::Network {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn response(key: impl Into<RequestKey>, status: u16) -> Self {
        FetchError::Response {
            key: key.into(),
            status,
        }
    }

    pub fn parse(key: impl Into<RequestKey>, message: impl Into<String>) -> Self {
        FetchError::Parse {
            key: key.into(),
            message: message.into(),
        }
    }

    /// The HTTP status code, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Network { .. })
    }

    /// The key of the failed request, if the failure is tied to one.
    pub fn key(&self) -> Option<&RequestKey> {
        match self {
            FetchError::Network { key, .. }
            | FetchError::Response { key, .. }
            | FetchError::Parse { key, .. } => Some(key),
            FetchError::CacheClosed => None,
        }
    }
}

/// The error half of an observable resource state.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub message: String,
    pub cause: Option<FetchError>,
}

impl ErrorInfo {
    /// The status code of the underlying response error, if any.
    pub fn status(&self) -> Option<u16> {
        self.cause.as_ref().and_then(FetchError::status)
    }
}

impl From<FetchError> for ErrorInfo {
    fn from(err: FetchError) -> Self {
        Self {
            message: err.to_string(),
            cause: Some(err),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Errors raised while building clients or reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}
