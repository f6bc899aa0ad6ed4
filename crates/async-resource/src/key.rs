//! # Request Keys
//!
//! A [`RequestKey`] names one fetchable resource, usually a path such as
//! `/users/u1/friends`. It is the unit of deduplication in the prefetch cache
//! and the identity a state handle is bound to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque, immutable identifier of a fetchable resource.
///
/// Cloning is a reference-count bump, so keys can be handed to every waiter
/// and log line without copying the string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestKey(Arc<str>);

impl RequestKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Builds a key from a path template, substituting `:name` segments.
    ///
    /// Values are percent-encoded. Segments without a matching parameter are
    /// left untouched.
    ///
    /// ```
    /// use async_resource::RequestKey;
    ///
    /// let key = RequestKey::with_params("/users/:id/friends", &[("id", "u 1")]);
    /// assert_eq!(key.as_str(), "/users/u%201/friends");
    /// ```
    pub fn with_params(template: &str, params: &[(&str, &str)]) -> Self {
        let path = template
            .split('/')
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => params
                    .iter()
                    .find(|(param, _)| *param == name)
                    .map(|(_, value)| urlencoding::encode(value).into_owned())
                    .unwrap_or_else(|| segment.to_string()),
                None => segment.to_string(),
            })
            .collect::<Vec<_>>()
            .join("/");
        Self::new(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the key is already an absolute URL rather than a path.
    pub fn is_absolute(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl From<&str> for RequestKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for RequestKey {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

impl From<&RequestKey> for RequestKey {
    fn from(key: &RequestKey) -> Self {
        key.clone()
    }
}

impl AsRef<str> for RequestKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_params_substitutes_every_named_segment() {
        let key = RequestKey::with_params("/users/:id/posts/:post", &[("id", "u1"), ("post", "7")]);
        assert_eq!(key.as_str(), "/users/u1/posts/7");
    }

    #[test]
    fn test_with_params_leaves_unknown_segments() {
        let key = RequestKey::with_params("/users/:id", &[]);
        assert_eq!(key.as_str(), "/users/:id");
    }

    #[test]
    fn test_keys_compare_by_content() {
        let a = RequestKey::from("/users/u1");
        let b = RequestKey::from(String::from("/users/u1"));
        assert_eq!(a, b);
        assert!(!a.is_absolute());
        assert!(RequestKey::from("https://api.example.com/users").is_absolute());
    }
}
