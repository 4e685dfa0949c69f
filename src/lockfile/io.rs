//! Loading and saving `spec.sum`.

use anyhow::{Context, Result};
use std::path::Path;

use super::LockFile;
use crate::constants::LOCKFILE_SCHEMA_VERSION;
use crate::core::SpecLedgerError;
use crate::utils::atomic_write;

impl LockFile {
    /// Load the lockfile at `path`; a missing or empty file is an empty lockfile.
    ///
    /// # Errors
    ///
    /// [`SpecLedgerError::LockfileParseError`] for malformed JSON or an
    /// unknown schema version.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => {
                return Err(SpecLedgerError::IoError(e))
                    .with_context(|| format!("Failed to read lockfile {}", path.display()));
            }
        };
        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let parse_error = |reason: String| SpecLedgerError::LockfileParseError {
            file: path.display().to_string(),
            reason,
        };
        let lockfile: Self = serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?;
        if lockfile.schema_version != LOCKFILE_SCHEMA_VERSION {
            return Err(parse_error(format!(
                "unsupported schema version {} (expected {})",
                lockfile.schema_version, LOCKFILE_SCHEMA_VERSION
            ))
            .into());
        }
        Ok(lockfile)
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json_string(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self).context("Failed to serialize lockfile")?;
        json.push('\n');
        Ok(json)
    }

    /// Write atomically: readers see the old or the new file, never a mix.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_json_string()?;
        atomic_write(path, content.as_bytes())
            .with_context(|| format!("Failed to write lockfile {}", path.display()))
    }
}
