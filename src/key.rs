//! Transformation identity.
//!
//! The surrounding pipeline caches transformation results by key, and may
//! persist those keys across builds, so a key must be a pure function of
//! the operation name and the full option set.
//!
//! The digest is SHA-256 over `name`, a NUL separator, and the canonical
//! JSON serialization of [`Options`]. Struct fields serialize in declaration
//! order, so the byte stream is stable across runs and platforms.

use crate::options::Options;
use sha2::{Digest, Sha256};
use std::fmt;

/// Cache identity of one transformation instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransformationKey {
    name: String,
    digest: String,
}

impl TransformationKey {
    pub fn new(name: &str, options: &Options) -> Self {
        // A derived Serialize on plain strings, integers, bools and a unit/newtype
        // enum cannot fail.
        let canonical = serde_json::to_vec(options).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(&canonical);

        Self {
            name: name.to_string(),
            digest: format!("{:x}", hasher.finalize()),
        }
    }

    /// Operation name the key was built from, e.g. `svg2png`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercase hex SHA-256 digest.
    pub fn value(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for TransformationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.digest)
    }
}
