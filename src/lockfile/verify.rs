//! Structural checks of a lockfile against its manifest.

use std::fmt;

use super::LockFile;
use crate::git::is_commit_sha;
use crate::manifest::Manifest;

/// One problem found by [`LockFile::verify`] or a content check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyIssue {
    /// Manifest dependency without a lockfile entry
    Missing {
        alias: String,
        repository_url: String,
    },
    /// Lockfile entry no manifest dependency refers to
    Orphaned {
        repository_url: String,
        artifact_path: String,
    },
    MalformedCommit {
        repository_url: String,
        value: String,
    },
    MalformedContentHash {
        repository_url: String,
        value: String,
    },
    TotalSizeMismatch {
        recorded: u64,
        actual: u64,
    },
    /// Cached tree no longer hashes to the locked value
    ContentMismatch {
        alias: String,
        expected: String,
        actual: String,
    },
    /// Content check requested but the entry has not been fetched
    NotCached {
        alias: String,
    },
}

impl fmt::Display for VerifyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing {
                alias,
                repository_url,
            } => write!(f, "'{alias}' ({repository_url}) is not in the lockfile"),
            Self::Orphaned {
                repository_url,
                artifact_path,
            } => write!(f, "{repository_url} {artifact_path} is locked but not declared"),
            Self::MalformedCommit {
                repository_url,
                value,
            } => write!(f, "{repository_url}: commit_hash '{value}' is not 40 hex characters"),
            Self::MalformedContentHash {
                repository_url,
                value,
            } => write!(f, "{repository_url}: content_hash '{value}' is not 64 lowercase hex characters"),
            Self::TotalSizeMismatch {
                recorded,
                actual,
            } => write!(f, "total_size is {recorded} but entries sum to {actual}"),
            Self::ContentMismatch {
                alias,
                expected,
                actual,
            } => write!(f, "'{alias}' content hash is {actual}, lockfile has {expected}"),
            Self::NotCached {
                alias,
            } => write!(f, "'{alias}' is not in the cache; run `sl deps resolve`"),
        }
    }
}

/// Outcome of verification; empty means consistent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub issues: Vec<VerifyIssue>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

fn is_content_hash(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

impl LockFile {
    /// Compare against `manifest` without touching the network or cache.
    #[must_use]
    pub fn verify(&self, manifest: &Manifest) -> VerifyReport {
        let mut issues = Vec::new();

        for dep in &manifest.dependencies {
            if self.entry_for(dep).is_none() {
                issues.push(VerifyIssue::Missing {
                    alias: dep.alias_or_empty().to_string(),
                    repository_url: dep.repository_url.clone(),
                });
            }
        }

        for entry in &self.entries {
            if !manifest.dependencies.iter().any(|d| entry.matches(d)) {
                issues.push(VerifyIssue::Orphaned {
                    repository_url: entry.repository_url.clone(),
                    artifact_path: entry.artifact_path.clone(),
                });
            }
            if !is_commit_sha(&entry.commit_hash) {
                issues.push(VerifyIssue::MalformedCommit {
                    repository_url: entry.repository_url.clone(),
                    value: entry.commit_hash.clone(),
                });
            }
            if !is_content_hash(&entry.content_hash) {
                issues.push(VerifyIssue::MalformedContentHash {
                    repository_url: entry.repository_url.clone(),
                    value: entry.content_hash.clone(),
                });
            }
        }

        let actual: u64 = self.entries.iter().map(|e| e.size).sum();
        if actual != self.total_size {
            issues.push(VerifyIssue::TotalSizeMismatch {
                recorded: self.total_size,
                actual,
            });
        }

        VerifyReport {
            issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockfile::tests::entry;
    use crate::manifest::Dependency;

    fn manifest_with(urls: &[(&str, &str)]) -> Manifest {
        let mut manifest = Manifest::new("p", "PP");
        for (url, alias) in urls {
            manifest.dependencies.push(Dependency {
                repository_url: (*url).to_string(),
                version: "main".to_string(),
                artifact_path: "specs/".to_string(),
                alias: Some((*alias).to_string()),
            });
        }
        manifest
    }

    #[test]
    fn test_consistent_lockfile() {
        let manifest = manifest_with(&[("https://example.com/o/a", "a")]);
        let lockfile = LockFile::from_entries(vec![entry("https://example.com/o/a", "specs/", 6)]);
        assert!(lockfile.verify(&manifest).is_ok());
    }

    #[test]
    fn test_missing_orphaned_and_malformed() {
        let manifest = manifest_with(&[("https://example.com/o/a", "a"), ("https://example.com/o/b", "b")]);
        let mut orphan = entry("https://example.com/o/gone", "specs/", 1);
        orphan.commit_hash = "abc".to_string();
        orphan.content_hash = "B".repeat(64);
        let mut lockfile = LockFile::from_entries(vec![entry("https://example.com/o/a", "specs/", 6), orphan]);
        lockfile.total_size = 100;

        let issues = lockfile.verify(&manifest).issues;
        assert_eq!(issues.len(), 5);
        assert!(matches!(&issues[0], VerifyIssue::Missing { alias, .. } if alias == "b"));
        assert!(matches!(&issues[1], VerifyIssue::Orphaned { .. }));
        assert!(matches!(&issues[2], VerifyIssue::MalformedCommit { .. }));
        assert!(matches!(&issues[3], VerifyIssue::MalformedContentHash { .. }));
        assert!(matches!(&issues[4], VerifyIssue::TotalSizeMismatch { recorded: 100, actual: 7 }));
        assert!(issues[0].to_string().contains("not in the lockfile"));
    }
}
