//! Adding and removing dependencies.
//!
//! Both operations validate everything before touching `self`, so a failed
//! call leaves the manifest exactly as it was and the caller never has
//! anything to write back.

use super::{Dependency, Manifest, artifact_key, is_valid_alias, validate_artifact_path};
use crate::constants::{DEFAULT_ARTIFACT_PATH, DEFAULT_BRANCH};
use crate::core::{SpecLedgerError, ValidationIssue};
use crate::git::url::{derive_alias, same_repository, validate_git_url};
use crate::resolver::conflict::{Conflict, ConflictKind};

/// Input to [`Manifest::add_dependency`]; unset fields get defaults.
#[derive(Debug, Clone, Default)]
pub struct NewDependency {
    pub repository_url: String,
    /// Defaults to `main`
    pub version: Option<String>,
    /// Defaults to `specledger/`
    pub artifact_path: Option<String>,
    /// Defaults to the repository name, see [`derive_alias`]
    pub alias: Option<String>,
}

impl Manifest {
    /// Append a dependency.
    ///
    /// `project_url` is the enclosing project's own repository, when known.
    ///
    /// # Errors
    ///
    /// - [`SpecLedgerError::InvalidUrl`] for a malformed URL
    /// - [`SpecLedgerError::InvalidArtifactPath`] for an escaping or absolute path
    /// - [`SpecLedgerError::InvalidManifest`] for an empty version or malformed alias
    /// - [`SpecLedgerError::AliasCollision`] when the alias is taken
    /// - [`SpecLedgerError::ConflictError`] when `(url, artifact_path)` already exists
    /// - [`SpecLedgerError::SelfReference`] when the URL is the project's own
    pub fn add_dependency(
        &mut self,
        new: NewDependency,
        project_url: Option<&str>,
    ) -> Result<&Dependency, SpecLedgerError> {
        let url = new.repository_url.trim().to_string();
        validate_git_url(&url)?;

        if project_url.is_some_and(|own| same_repository(own, &url)) {
            return Err(SpecLedgerError::SelfReference {
                url,
            });
        }

        let artifact_path = new
            .artifact_path
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ARTIFACT_PATH.to_string());
        validate_artifact_path(&artifact_path)?;

        let version = new.version.unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        let alias = new.alias.unwrap_or_else(|| derive_alias(&url));
        let index = self.dependencies.len();

        let mut issues = Vec::new();
        if version.trim().is_empty() {
            issues.push(ValidationIssue::new(format!("dependencies[{index}].version"), "must not be empty"));
        }
        if !is_valid_alias(&alias) {
            issues.push(ValidationIssue::new(
                format!("dependencies[{index}].alias"),
                format!("'{alias}' must match [a-z0-9_-]+"),
            ));
        }
        if !issues.is_empty() {
            return Err(SpecLedgerError::InvalidManifest {
                issues,
            });
        }

        if self.find_by_alias(&alias).is_some() {
            return Err(SpecLedgerError::AliasCollision {
                alias,
            });
        }

        if let Some(existing) = self.dependencies.iter().find(|d| d.matches(&url, &artifact_path)) {
            return Err(SpecLedgerError::ConflictError {
                conflicts: vec![Conflict::new(
                    ConflictKind::Duplicate,
                    format!(
                        "{url} {artifact_path} is already declared as '{}'",
                        existing.alias_or_empty()
                    ),
                )],
            });
        }

        self.dependencies.push(Dependency {
            repository_url: url,
            version,
            artifact_path,
            alias: Some(alias),
        });
        self.updated_at = crate::utils::now_rfc3339();
        Ok(&self.dependencies[index])
    }

    /// Remove the dependency named by `target`.
    ///
    /// `target` is an alias, or a repository URL optionally narrowed by
    /// `artifact_path`. A URL that matches several dependencies needs the
    /// artifact path.
    ///
    /// # Errors
    ///
    /// [`SpecLedgerError::NotFound`] when nothing matches, or
    /// [`SpecLedgerError::Other`] when a URL alone is ambiguous.
    pub fn remove_dependency(
        &mut self,
        target: &str,
        artifact_path: Option<&str>,
    ) -> Result<Dependency, SpecLedgerError> {
        let by_alias = artifact_path
            .is_none()
            .then(|| self.dependencies.iter().position(|d| d.alias.as_deref() == Some(target)))
            .flatten();

        let index = match by_alias {
            Some(index) => index,
            None => {
                let matches: Vec<usize> = self
                    .dependencies
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| {
                        same_repository(&d.repository_url, target)
                            && artifact_path.is_none_or(|p| artifact_key(&d.artifact_path) == artifact_key(p))
                    })
                    .map(|(i, _)| i)
                    .collect();
                match matches.as_slice() {
                    [index] => *index,
                    [] => {
                        return Err(SpecLedgerError::NotFound {
                            what: match artifact_path {
                                Some(path) => format!("dependency {target} {path}"),
                                None => format!("dependency '{target}'"),
                            },
                        });
                    }
                    many => {
                        return Err(SpecLedgerError::Other {
                            message: format!(
                                "{target} matches {} dependencies; pass the artifact path to choose one",
                                many.len()
                            ),
                        });
                    }
                }
            }
        };

        self.updated_at = crate::utils::now_rfc3339();
        Ok(self.dependencies.remove(index))
    }
}
