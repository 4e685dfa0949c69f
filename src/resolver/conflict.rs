//! Conflict detection over a resolved (or declared) dependency set.
//!
//! Every rule runs over every candidate and all findings are returned;
//! nothing short-circuits and no winner is chosen.
//!
//! | Kind | Condition |
//! |------|-----------|
//! | `Duplicate` | two direct dependencies share `(repository_url, artifact_path)` |
//! | `AliasCollision` | two direct dependencies share an alias |
//! | `SelfReference` | a direct dependency is the project's own repository |
//! | `InvalidArtifactPath` | empty, absolute or escaping `artifact_path` |
//! | `VersionConflict` | the same alias for the same repository pinned to different commits |
//!
//! Two aliases sharing one repository at different artifact paths are not a
//! conflict. Candidates taken from dependencies' own lockfiles (`transitive`)
//! only take part in the version rule.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::git::url::{normalize_repo_url, same_repository};
use crate::manifest::{Dependency, artifact_key, validate_artifact_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    Duplicate,
    AliasCollision,
    SelfReference,
    InvalidArtifactPath,
    VersionConflict,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Duplicate => "duplicate",
            Self::AliasCollision => "alias collision",
            Self::SelfReference => "self-reference",
            Self::InvalidArtifactPath => "invalid artifact path",
            Self::VersionConflict => "version conflict",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub message: String,
}

impl Conflict {
    pub fn new(kind: ConflictKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// One dependency as seen by conflict detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub alias: String,
    pub repository_url: String,
    pub artifact_path: String,
    /// Concrete commit, when resolved or locked
    pub commit: Option<String>,
    /// Where it was declared, for messages (`spec.mod` or `<alias>/spec.sum`)
    pub origin: String,
    pub transitive: bool,
}

impl Candidate {
    /// Direct dependency from the project's own manifest.
    pub fn direct(dep: &Dependency, commit: Option<&str>) -> Self {
        Self {
            alias: dep.alias_or_empty().to_string(),
            repository_url: dep.repository_url.clone(),
            artifact_path: dep.artifact_path.clone(),
            commit: commit.map(str::to_string),
            origin: "spec.mod".to_string(),
            transitive: false,
        }
    }
}

/// Run every rule; `project_url` is the enclosing project's repository.
#[must_use]
pub fn detect_conflicts(candidates: &[Candidate], project_url: Option<&str>) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    let direct: Vec<&Candidate> = candidates.iter().filter(|c| !c.transitive).collect();

    let mut seen_keys: HashMap<(String, String), &Candidate> = HashMap::new();
    let mut seen_aliases: HashMap<&str, &Candidate> = HashMap::new();

    for candidate in &direct {
        if let Err(e) = validate_artifact_path(&candidate.artifact_path) {
            conflicts.push(Conflict::new(
                ConflictKind::InvalidArtifactPath,
                format!("'{}': {e}", candidate.alias),
            ));
        }

        if project_url.is_some_and(|own| same_repository(own, &candidate.repository_url)) {
            conflicts.push(Conflict::new(
                ConflictKind::SelfReference,
                format!("'{}' points at this project's repository {}", candidate.alias, candidate.repository_url),
            ));
        }

        let key = (normalize_repo_url(&candidate.repository_url), artifact_key(&candidate.artifact_path));
        match seen_keys.get(&key) {
            Some(first) => conflicts.push(Conflict::new(
                ConflictKind::Duplicate,
                format!(
                    "'{}' and '{}' both declare {} {}",
                    first.alias, candidate.alias, candidate.repository_url, candidate.artifact_path
                ),
            )),
            None => {
                seen_keys.insert(key, candidate);
            }
        }

        if !candidate.alias.is_empty() {
            match seen_aliases.get(candidate.alias.as_str()) {
                Some(first) => conflicts.push(Conflict::new(
                    ConflictKind::AliasCollision,
                    format!(
                        "'{}' is used for both {} and {}",
                        candidate.alias, first.repository_url, candidate.repository_url
                    ),
                )),
                None => {
                    seen_aliases.insert(&candidate.alias, candidate);
                }
            }
        }
    }

    // Same alias and repository, different commits
    let mut pins: BTreeMap<(String, String), BTreeSet<(String, String)>> = BTreeMap::new();
    for candidate in candidates {
        if candidate.alias.is_empty() {
            continue;
        }
        if let Some(commit) = &candidate.commit {
            pins.entry((candidate.alias.clone(), normalize_repo_url(&candidate.repository_url)))
                .or_default()
                .insert((commit.clone(), candidate.origin.clone()));
        }
    }
    for ((alias, repo), found) in pins {
        let commits: BTreeSet<&str> = found.iter().map(|(c, _)| c.as_str()).collect();
        if commits.len() > 1 {
            let detail = found
                .iter()
                .map(|(commit, origin)| format!("{} in {origin}", commit.get(..12).unwrap_or(commit)))
                .collect::<Vec<_>>()
                .join(", ");
            conflicts.push(Conflict::new(
                ConflictKind::VersionConflict,
                format!("'{alias}' ({repo}) is pinned to different commits: {detail}"),
            ));
        }
    }

    conflicts
}
