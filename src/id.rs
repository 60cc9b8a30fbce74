//! Clip identifiers
//!
//! A clip id is 128 random bits rendered as 32 lowercase hex characters with
//! no separators. The same string names the blob file on disk, and the
//! sidecar is `<id>.meta`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of a canonical clip id
pub const ID_LEN: usize = 32;

/// A validated clip identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(String);

impl ClipId {
    /// Parse a candidate id, accepting only the canonical 32 lowercase hex form.
    pub fn parse(candidate: &str) -> Option<Self> {
        if is_canonical(candidate) {
            Some(Self(candidate.to_string()))
        } else {
            None
        }
    }

    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClipId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check a string against the canonical id pattern `^[0-9a-f]{32}$`
pub fn is_canonical(candidate: &str) -> bool {
    candidate.len() == ID_LEN
        && candidate
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Source of new clip ids.
///
/// The store asks its generator for an id whenever it commits an upload.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> ClipId;
}

/// Default generator backed by v4 UUIDs
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> ClipId {
        ClipId::generate()
    }
}
