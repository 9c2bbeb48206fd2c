//! Opaque blob-store references.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque reference to a blob-store object.
///
/// The core never handles raw media bytes. Uploaded product photos and
/// generated outputs live in an external blob store; this type carries
/// the store's reference string through job records and API payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(String);

impl MediaRef {
    /// Wrap a blob-store reference string.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Return the reference string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MediaRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MediaRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}
