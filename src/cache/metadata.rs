//! Sidecar metadata stored next to each cache entry's working tree.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::SpecLedgerError;
use crate::utils::atomic_write;

/// File name of the sidecar inside a cache entry directory.
pub const METADATA_FILE: &str = "metadata.json";

/// What the cache last did for an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub repository_url: String,
    /// Last requested ref (the dependency's `version`)
    pub branch: String,
    pub commit_hash: String,
    /// RFC 3339, UTC
    pub last_accessed: String,
}

impl CacheMetadata {
    /// Read the sidecar from `entry_dir`.
    ///
    /// Returns `Ok(None)` when the file does not exist and
    /// [`SpecLedgerError::CacheCorrupt`] when it cannot be parsed.
    pub fn load(entry_dir: &Path) -> Result<Option<Self>> {
        let path = entry_dir.join(METADATA_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        serde_json::from_str(&content).map(Some).map_err(|e| {
            SpecLedgerError::CacheCorrupt {
                path: path.display().to_string(),
                reason: format!("unreadable metadata: {e}"),
            }
            .into()
        })
    }

    pub fn save(&self, entry_dir: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self).context("Failed to serialize cache metadata")?;
        json.push('\n');
        atomic_write(&entry_dir.join(METADATA_FILE), json.as_bytes())
    }
}
