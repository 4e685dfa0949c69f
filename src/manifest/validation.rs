//! Manifest validation.
//!
//! Validation collects every problem instead of stopping at the first one.
//! Each [`ValidationIssue`] names the offending field with a path such as
//! `dependencies[1].alias`.

use std::collections::HashMap;
use std::path::{Component, Path};

use super::Manifest;
use crate::constants::MANIFEST_SCHEMA_VERSION;
use crate::core::{SpecLedgerError, ValidationIssue};
use crate::git::url::{normalize_repo_url, validate_git_url};

/// `[a-z0-9_-]+`
#[must_use]
pub fn is_valid_alias(alias: &str) -> bool {
    !alias.is_empty()
        && alias.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// A relative path that stays inside its root.
///
/// # Errors
///
/// [`SpecLedgerError::InvalidArtifactPath`] when `path` is empty, absolute,
/// or has a `..` segment.
pub fn validate_artifact_path(path: &str) -> Result<(), SpecLedgerError> {
    let invalid = |reason: &str| SpecLedgerError::InvalidArtifactPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if path.starts_with('/') || path.starts_with('\\') || Path::new(path).is_absolute() {
        return Err(invalid("must be relative"));
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(invalid("must not contain '..'"));
    }
    if Path::new(path).components().any(|c| matches!(c, Component::Prefix(_))) {
        return Err(invalid("must be relative"));
    }
    Ok(())
}

/// Comparison key for artifact paths: `./` prefix and trailing `/` removed.
#[must_use]
pub fn artifact_key(path: &str) -> String {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    trimmed.trim_end_matches('/').to_string()
}

fn is_valid_project_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_valid_short_code(code: &str) -> bool {
    (2..=10).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphanumeric())
}

impl Manifest {
    /// Every schema and invariant violation, in document order.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.schema_version != MANIFEST_SCHEMA_VERSION {
            issues.push(ValidationIssue::new(
                "schema_version",
                format!(
                    "unsupported version {} (expected {})",
                    self.schema_version, MANIFEST_SCHEMA_VERSION
                ),
            ));
        }

        if !is_valid_project_name(&self.project.name) {
            issues.push(ValidationIssue::new(
                "project.name",
                "must be non-empty and contain only letters, digits and '-'",
            ));
        }
        if !is_valid_short_code(&self.project.short_code) {
            issues.push(ValidationIssue::new("project.short_code", "must be 2-10 letters or digits"));
        }
        if let Err(SpecLedgerError::InvalidArtifactPath {
            reason,
            ..
        }) = validate_artifact_path(&self.project.artifact_path)
        {
            issues.push(ValidationIssue::new("project.artifact_path", reason));
        }
        if let Some(playbook) = &self.playbook
            && playbook.name.trim().is_empty()
        {
            issues.push(ValidationIssue::new("playbook.name", "must not be empty"));
        }
        if chrono::DateTime::parse_from_rfc3339(&self.updated_at).is_err() {
            issues.push(ValidationIssue::new(
                "updated_at",
                format!("'{}' is not an RFC 3339 timestamp", self.updated_at),
            ));
        }

        let mut seen_keys: HashMap<(String, String), usize> = HashMap::new();
        let mut seen_aliases: HashMap<&str, usize> = HashMap::new();

        for (i, dep) in self.dependencies.iter().enumerate() {
            let field = |name: &str| format!("dependencies[{i}].{name}");

            match validate_git_url(&dep.repository_url) {
                Err(SpecLedgerError::InvalidUrl {
                    reason,
                    ..
                }) => issues.push(ValidationIssue::new(field("repository_url"), reason)),
                Err(other) => issues.push(ValidationIssue::new(field("repository_url"), other.to_string())),
                Ok(()) => {}
            }

            if dep.version.trim().is_empty() {
                issues.push(ValidationIssue::new(field("version"), "must not be empty"));
            }

            if let Err(SpecLedgerError::InvalidArtifactPath {
                reason,
                ..
            }) = validate_artifact_path(&dep.artifact_path)
            {
                issues.push(ValidationIssue::new(field("artifact_path"), reason));
            }

            match dep.alias.as_deref() {
                None | Some("") => issues.push(ValidationIssue::new(field("alias"), "is required")),
                Some(alias) if !is_valid_alias(alias) => issues.push(ValidationIssue::new(
                    field("alias"),
                    format!("'{alias}' must match [a-z0-9_-]+"),
                )),
                Some(alias) => match seen_aliases.get(alias) {
                    Some(first) => issues.push(ValidationIssue::new(
                        field("alias"),
                        format!("'{alias}' is already used by dependencies[{first}]"),
                    )),
                    None => {
                        seen_aliases.insert(alias, i);
                    }
                },
            }

            let key = (normalize_repo_url(&dep.repository_url), artifact_key(&dep.artifact_path));
            if let Some(first) = seen_keys.get(&key) {
                issues.push(ValidationIssue::new(
                    format!("dependencies[{i}]"),
                    format!(
                        "duplicates dependencies[{first}] ({} {})",
                        dep.repository_url, dep.artifact_path
                    ),
                ));
            } else {
                seen_keys.insert(key, i);
            }
        }

        issues
    }
}
