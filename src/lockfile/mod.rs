//! Lockfile (`spec.sum`) model
//!
//! The lockfile pins every manifest dependency to a concrete commit and the
//! content hash of its artifact tree. It is written only by the resolver and
//! lives beside the manifest. The on-disk form is pretty-printed JSON with a
//! trailing newline, fields in declaration order:
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "entries": [
//!     {
//!       "repository_url": "https://example.com/o/r",
//!       "branch": "main",
//!       "commit_hash": "…40 hex…",
//!       "artifact_path": "specs/",
//!       "content_hash": "…64 hex…",
//!       "size": 6,
//!       "fetched_at": "2025-01-01T00:00:00Z"
//!     }
//!   ],
//!   "total_size": 6
//! }
//! ```
//!
//! Entries are keyed by `(repository_url, artifact_path)` and kept in
//! manifest order. Aliases are not stored; they are recovered by joining
//! with the manifest (see [`LockFile::by_alias`]).

mod io;
mod verify;

pub use verify::{VerifyIssue, VerifyReport};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::LOCKFILE_SCHEMA_VERSION;
use crate::manifest::{Dependency, Manifest};

/// Root document of `spec.sum`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    pub schema_version: u32,
    #[serde(default)]
    pub entries: Vec<LockEntry>,
    #[serde(default)]
    pub total_size: u64,
}

/// A dependency pinned to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    pub repository_url: String,
    /// Requested ref (the dependency's `version`)
    pub branch: String,
    /// 40-hex commit, even when `branch` is a branch name
    pub commit_hash: String,
    pub artifact_path: String,
    /// 64-hex lowercase, see [`crate::hashing`]
    pub content_hash: String,
    pub size: u64,
    /// RFC 3339, UTC
    pub fetched_at: String,
}

impl LockEntry {
    pub fn matches(&self, dep: &Dependency) -> bool {
        dep.matches(&self.repository_url, &self.artifact_path)
    }
}

impl Default for LockFile {
    fn default() -> Self {
        Self::new()
    }
}

impl LockFile {
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_version: LOCKFILE_SCHEMA_VERSION,
            entries: Vec::new(),
            total_size: 0,
        }
    }

    /// Build from entries in order, computing `total_size`.
    #[must_use]
    pub fn from_entries(entries: Vec<LockEntry>) -> Self {
        let mut lockfile = Self {
            entries,
            ..Self::new()
        };
        lockfile.recompute_total_size();
        lockfile
    }

    pub fn recompute_total_size(&mut self) {
        self.total_size = self.entries.iter().map(|e| e.size).sum();
    }

    pub fn entry_for(&self, dep: &Dependency) -> Option<&LockEntry> {
        self.entries.iter().find(|e| e.matches(dep))
    }

    /// Locked entries reachable through a manifest alias.
    pub fn by_alias<'a>(&'a self, manifest: &'a Manifest) -> BTreeMap<&'a str, (&'a Dependency, &'a LockEntry)> {
        manifest
            .dependencies
            .iter()
            .filter_map(|dep| {
                let alias = dep.alias.as_deref()?;
                let entry = self.entry_for(dep)?;
                Some((alias, (dep, entry)))
            })
            .collect()
    }

    /// Composite hash of the whole dependency set, see
    /// [`crate::hashing::composite_hash`].
    #[must_use]
    pub fn composite_hash(&self) -> String {
        crate::hashing::composite_hash(self.entries.iter().map(|e| {
            (
                e.repository_url.as_str(),
                e.artifact_path.as_str(),
                e.commit_hash.as_str(),
                e.content_hash.as_str(),
            )
        }))
    }
}
