//! Reading and writing `spec.mod`.

use anyhow::{Context, Result};
use std::path::Path;

use super::Manifest;
use crate::core::SpecLedgerError;
use crate::utils::atomic_write;

impl Manifest {
    /// Load and validate the manifest at `path`.
    ///
    /// # Errors
    ///
    /// - [`SpecLedgerError::NotAProject`] when the file does not exist
    /// - [`SpecLedgerError::ManifestParseError`] for malformed YAML
    /// - [`SpecLedgerError::InvalidManifest`] listing every validation issue
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SpecLedgerError::NotAProject {
                    path: path.display().to_string(),
                }
                .into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read manifest {}", path.display()));
            }
        };

        let manifest = Self::from_yaml_str(&content).map_err(|e| SpecLedgerError::ManifestParseError {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;
        manifest.ensure_valid()?;
        Ok(manifest)
    }

    /// Parse without validating.
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Serialise with stable field order.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize manifest")
    }

    /// Validate, then write atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.ensure_valid()?;
        let content = self.to_yaml_string()?;
        atomic_write(path, content.as_bytes())
            .with_context(|| format!("Failed to write manifest {}", path.display()))
    }

    /// [`Self::validate`] as a single error.
    pub fn ensure_valid(&self) -> Result<(), SpecLedgerError> {
        let issues = self.validate();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(SpecLedgerError::InvalidManifest {
                issues,
            })
        }
    }
}
