//! References from project specs to dependency artifacts
//!
//! A spec points at an artifact of a dependency either as `alias:artifact-name`
//! (inside a Markdown link target) or with the inline `spec.<alias>#<section>`
//! form. [`parse_spec`] extracts them, [`validate`] checks that every alias
//! is locked, and [`resolve_with_cache`] maps a
//! reference to the file it names: `<project.artifact_path>/<alias>/<artifact-name>`
//! inside the project, falling back to the dependency's cache working tree.

mod parser;

pub use parser::parse_spec;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::SpecLedgerError;
use crate::manifest::validate_artifact_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Link,
    Image,
    Inline,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Link => "link",
            Self::Image => "image",
            Self::Inline => "inline",
        })
    }
}

/// What a reference points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Absolute URL
    External(String),
    /// `#anchor` in the same document
    Anchor(String),
    /// A dependency, optionally narrowed to an artifact and section
    Dependency {
        alias: String,
        artifact: Option<String>,
        section: Option<String>,
    },
    /// Relative path that names no dependency
    Local(String),
}

/// One reference found in a spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: ReferenceKind,
    /// Link label, image alt text, or the inline reference itself
    pub text: String,
    /// Target as written
    pub raw: String,
    pub target: Target,
    pub line: usize,
    pub column: usize,
}

impl Reference {
    pub fn alias(&self) -> Option<&str> {
        match &self.target {
            Target::Dependency {
                alias,
                ..
            } => Some(alias),
            _ => None,
        }
    }
}

/// A reference that failed validation.
#[derive(Debug)]
pub struct ReferenceError {
    pub reference: Reference,
    pub error: SpecLedgerError,
    /// Closest known alias, when one is near
    pub suggestion: Option<String>,
}

impl fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.reference.line, self.reference.column, self.error)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean '{suggestion}'?)")?;
        }
        Ok(())
    }
}

/// Check references against the aliases present in the lockfile.
///
/// Images are skipped. External URLs and anchors are always valid. A
/// dependency reference is valid iff its alias is known. A local path names
/// no dependency and is reported.
pub fn validate<'a>(
    references: &[Reference],
    known_aliases: impl IntoIterator<Item = &'a str>,
) -> Vec<ReferenceError> {
    let known: Vec<&str> = known_aliases.into_iter().collect();
    let mut errors = Vec::new();

    for reference in references {
        if reference.kind == ReferenceKind::Image {
            continue;
        }
        match &reference.target {
            Target::External(_) | Target::Anchor(_) => {}
            Target::Dependency {
                alias,
                ..
            } => {
                if !known.contains(&alias.as_str()) {
                    errors.push(ReferenceError {
                        reference: reference.clone(),
                        error: SpecLedgerError::NotFound {
                            what: format!("dependency alias '{alias}'"),
                        },
                        suggestion: closest(alias, &known),
                    });
                }
            }
            Target::Local(path) => errors.push(ReferenceError {
                reference: reference.clone(),
                error: SpecLedgerError::NotFound {
                    what: format!("dependency for '{path}'"),
                },
                suggestion: None,
            }),
        }
    }

    errors
}

fn closest(alias: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|candidate| (strsim::levenshtein(alias, candidate), *candidate))
        .filter(|(distance, _)| *distance <= 2)
        .min()
        .map(|(_, candidate)| candidate.to_string())
}

/// `project_artifact_path` with exactly one trailing `/`.
fn normalize_artifact_root(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    format!("{trimmed}/")
}

/// `<project_artifact_path>/<alias>/<artifact_name>`, relative to the project.
///
/// When `project_root` is given the file must exist beneath it.
///
/// # Errors
///
/// - [`SpecLedgerError::InvalidArtifactPath`] when `artifact_name` escapes
/// - [`SpecLedgerError::NotFound`] when the file is missing
fn resolve_project(
    project_artifact_path: &str,
    alias: &str,
    artifact_name: &str,
    project_root: Option<&Path>,
) -> Result<String, SpecLedgerError> {
    let rel = project_path(project_artifact_path, alias, artifact_name)?;
    if let Some(root) = project_root.filter(|r| !r.as_os_str().is_empty())
        && !root.join(&rel).exists()
    {
        return Err(SpecLedgerError::NotFound {
            what: format!("artifact {rel}"),
        });
    }
    Ok(rel)
}

/// `<project_artifact_path>/<alias>/<artifact_name>` relative to the
/// project, plus `<cache_path>/<dep_artifact_path>/<artifact_name>`.
///
/// With `project_root` set, either the project file or the cache file must
/// exist.
///
/// # Errors
///
/// - [`SpecLedgerError::InvalidArtifactPath`] when `artifact_name` escapes
/// - [`SpecLedgerError::NotFound`] when neither file exists
pub fn resolve_with_cache(
    project_artifact_path: &str,
    alias: &str,
    dep_artifact_path: &str,
    artifact_name: &str,
    project_root: Option<&Path>,
    cache_path: &Path,
) -> Result<(String, PathBuf), SpecLedgerError> {
    let cache_abs = cache_path.join(dep_artifact_path).join(artifact_name);
    match resolve_project(project_artifact_path, alias, artifact_name, project_root) {
        Ok(rel) => Ok((rel, cache_abs)),
        Err(SpecLedgerError::NotFound {
            ..
        }) => {
            let rel = project_path(project_artifact_path, alias, artifact_name)?;
            if cache_abs.exists() {
                Ok((rel, cache_abs))
            } else {
                Err(SpecLedgerError::NotFound {
                    what: format!("artifact {rel} (also not at {})", cache_abs.display()),
                })
            }
        }
        Err(e) => Err(e),
    }
}

fn project_path(
    project_artifact_path: &str,
    alias: &str,
    artifact_name: &str,
) -> Result<String, SpecLedgerError> {
    validate_artifact_path(artifact_name)?;
    Ok(format!(
        "{}{}/{}",
        normalize_artifact_root(project_artifact_path),
        alias,
        artifact_name.trim_start_matches("./")
    ))
}
