//! Result cache for `build`.
//!
//! Inkscape start-up alone costs hundreds of milliseconds per file, so a
//! rebuild skips every SVG whose bytes and options are unchanged since the
//! last run.
//!
//! ## Cache keys
//!
//! Lookups are content-addressed by `source_hash` and the
//! [transformation key](crate::key::TransformationKey), not by output path:
//!
//! - **`source_hash`**: SHA-256 of the SVG file contents. Content-based
//!   rather than mtime-based so it survives `git checkout`.
//! - **`key`**: digest of the operation name and the full option set. Any
//!   option change produces a new key and a re-render.
//!
//! A hit requires a matching entry **and** the previously written PNG still
//! on disk. When the content matches but the output path moved (a renamed
//! source file), the old PNG is copied instead of re-rendered.
//!
//! ## Storage
//!
//! `<output_dir>/.raster-cache.json`, next to the rendered files, so it
//! travels with the output directory when CI caches it.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;

/// Name of the cache manifest file within the output directory.
const MANIFEST_FILENAME: &str = ".raster-cache.json";

/// Bump to invalidate every existing cache when the format or key
/// computation changes.
const MANIFEST_VERSION: u32 = 1;

/// A single cached output file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub key: String,
}

/// On-disk manifest mapping output paths (relative to the output
/// directory) to their cache entries.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
    /// `"{source_hash}:{key}"` → output path. Rebuilt on load, never
    /// serialized.
    #[serde(skip)]
    content_index: HashMap<String, String>,
}

fn content_key(source_hash: &str, key: &str) -> String {
    format!("{source_hash}:{key}")
}

impl CacheManifest {
    /// Create an empty manifest (used for `--no-cache` or first build).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
            content_index: HashMap::new(),
        }
    }

    /// Load from the output directory. Missing, unparsable, or
    /// other-version manifests load as empty.
    pub fn load(output_dir: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(output_dir.join(MANIFEST_FILENAME)) else {
            return Self::empty();
        };
        let mut manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("ignoring unreadable cache manifest: {e}");
                return Self::empty();
            }
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest.content_index = manifest
            .entries
            .iter()
            .map(|(path, entry)| (content_key(&entry.source_hash, &entry.key), path.clone()))
            .collect();
        manifest
    }

    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(output_dir.join(MANIFEST_FILENAME), json)
    }

    /// Stored output path for this content, if the file is still on disk.
    ///
    /// `expected` wins when it already holds this content; otherwise any
    /// other path with the same content is returned (a renamed source).
    pub fn find_cached(
        &self,
        source_hash: &str,
        key: &str,
        expected: &str,
        output_dir: &Path,
    ) -> Option<String> {
        let exact = self
            .entries
            .get(expected)
            .is_some_and(|e| e.source_hash == source_hash && e.key == key);
        if exact && output_dir.join(expected).exists() {
            return Some(expected.to_string());
        }
        let stored = self.content_index.get(&content_key(source_hash, key))?;
        output_dir.join(stored).exists().then(|| stored.clone())
    }

    /// Record an output file. Several paths may share the same content.
    pub fn insert(&mut self, output_path: String, source_hash: String, key: String) {
        self.content_index
            .insert(content_key(&source_hash, &key), output_path.clone());
        self.entries
            .insert(output_path, CacheEntry { source_hash, key });
    }
}

/// SHA-256 of a file's contents, as hex.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Per-run cache counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
    /// Pre-built assets used because the tool was missing.
    pub fallbacks: u32,
    /// Files skipped: tool missing and no pre-built asset.
    pub unavailable: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses + self.fallbacks + self.unavailable
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.hits > 0 {
            parts.push(format!("{} cached", self.hits));
        }
        if self.copies > 0 {
            parts.push(format!("{} copied", self.copies));
        }
        parts.push(format!("{} rendered", self.misses));
        if self.fallbacks > 0 {
            parts.push(format!("{} pre-built", self.fallbacks));
        }
        if self.unavailable > 0 {
            parts.push(format!("{} skipped", self.unavailable));
        }
        if parts.len() > 1 {
            write!(f, "{} ({} total)", parts.join(", "), self.total())
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}
