//! Manifest (`spec.mod`) model and project discovery
//!
//! The manifest is the human-edited declaration of a project's external
//! specification dependencies. It lives at `<project>/<artifact_path>/spec.mod`
//! and is YAML:
//!
//! ```yaml
//! schema_version: 1
//! project:
//!   name: payments
//!   short_code: PAY
//!   artifact_path: specledger/
//! playbook:
//!   name: default
//! dependencies:
//! - repository_url: git@github.com:acme/api-specs.git
//!   version: main
//!   artifact_path: specs/
//!   alias: api
//! updated_at: 2025-01-01T00:00:00Z
//! ```
//!
//! Field order on disk is the declaration order of the structs below, so a
//! manifest written by this crate and read back serialises to the same bytes.
//!
//! Loading validates the document (see [`Manifest::validate`]); every problem
//! is reported at once in [`SpecLedgerError::InvalidManifest`].

mod io;
mod mutations;
mod validation;

pub use mutations::NewDependency;
pub use validation::{artifact_key, is_valid_alias, validate_artifact_path};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_ARTIFACT_PATH, DEFAULT_BRANCH, LOCKFILE_FILE, MANIFEST_FILE, MANIFEST_SCHEMA_VERSION,
};
use crate::core::SpecLedgerError;

fn default_version() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_artifact_path() -> String {
    DEFAULT_ARTIFACT_PATH.to_string()
}

/// Root document of `spec.mod`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub project: ProjectInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbook: Option<Playbook>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub short_code: String,
    /// Project-local artifact root, e.g. `specledger/`
    #[serde(default = "default_artifact_path")]
    pub artifact_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playbook {
    pub name: String,
}

/// One declared external specification source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub repository_url: String,
    /// Branch, tag or full commit SHA
    #[serde(default = "default_version")]
    pub version: String,
    /// Directory (trailing `/`) or file inside the dependency repository
    #[serde(default)]
    pub artifact_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Dependency {
    /// Alias, or an empty string when none is set.
    pub fn alias_or_empty(&self) -> &str {
        self.alias.as_deref().unwrap_or_default()
    }

    /// `(repository_url, artifact_path)` identity used for uniqueness and
    /// for matching lockfile entries.
    pub fn matches(&self, repository_url: &str, artifact_path: &str) -> bool {
        crate::git::url::same_repository(&self.repository_url, repository_url)
            && artifact_key(&self.artifact_path) == artifact_key(artifact_path)
    }
}

impl Manifest {
    /// Empty manifest for a new project.
    pub fn new(name: impl Into<String>, short_code: impl Into<String>) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            project: ProjectInfo {
                name: name.into(),
                short_code: short_code.into(),
                artifact_path: default_artifact_path(),
            },
            playbook: None,
            dependencies: Vec::new(),
            updated_at: crate::utils::now_rfc3339(),
        }
    }

    pub fn find_by_alias(&self, alias: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.alias.as_deref() == Some(alias))
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().filter_map(|d| d.alias.as_deref())
    }
}

/// A manifest together with where it lives.
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory that contains the artifact root
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: Manifest,
}

impl Project {
    /// Load the project whose manifest is at `manifest_path`.
    pub fn load(manifest_path: &Path) -> Result<Self> {
        let manifest = Manifest::load(manifest_path)?;
        let artifact_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        let root = project_root(artifact_dir, &manifest.project.artifact_path);
        Ok(Self {
            root,
            manifest_path: manifest_path.to_path_buf(),
            manifest,
        })
    }

    /// Directory holding `spec.mod` and `spec.sum`.
    pub fn artifact_dir(&self) -> PathBuf {
        self.manifest_path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.artifact_dir().join(LOCKFILE_FILE)
    }

    pub fn save_manifest(&self) -> Result<()> {
        self.manifest.save(&self.manifest_path)
    }
}

/// Find `spec.mod`: `explicit` when given, else `<dir>/specledger/spec.mod`
/// in `start` or its closest ancestor that has one.
///
/// # Errors
///
/// [`SpecLedgerError::NotAProject`] when nothing is found.
pub fn find_manifest(explicit: Option<&Path>, start: &Path) -> Result<PathBuf, SpecLedgerError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(SpecLedgerError::NotAProject {
                path: path.display().to_string(),
            })
        };
    }

    let relative = Path::new(DEFAULT_ARTIFACT_PATH).join(MANIFEST_FILE);
    for dir in start.ancestors() {
        let candidate = dir.join(&relative);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Err(SpecLedgerError::NotAProject {
        path: start.join(relative).display().to_string(),
    })
}

/// Strip `artifact_path` from the end of `artifact_dir`; when the two do not
/// line up, the parent of `artifact_dir` is the root.
fn project_root(artifact_dir: &Path, artifact_path: &str) -> PathBuf {
    let rel = Path::new(artifact_path.trim_start_matches("./").trim_end_matches('/'));
    if !rel.as_os_str().is_empty() && artifact_dir.ends_with(rel) {
        let depth = rel.components().count();
        if let Some(root) = artifact_dir.ancestors().nth(depth) {
            return root.to_path_buf();
        }
    }
    artifact_dir.parent().map_or_else(|| artifact_dir.to_path_buf(), Path::to_path_buf)
}
