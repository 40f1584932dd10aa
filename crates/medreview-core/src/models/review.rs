//! Review identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one medication review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ReviewId(String);

impl ReviewId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Context threaded through the store, the save queue and backend calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewContext {
    pub review_id: ReviewId,
}

impl ReviewContext {
    pub fn new(review_id: ReviewId) -> Self {
        Self { review_id }
    }
}
