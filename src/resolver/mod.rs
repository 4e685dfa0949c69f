//! Dependency resolution
//!
//! The resolver turns a project's manifest into its lockfile by driving the
//! [`Cache`] (and through it the git transport) and [`crate::hashing`].
//!
//! # Algorithm
//!
//! 1. Validate the manifest; any issue aborts before anything is fetched.
//! 2. Take the project lock (`<artifact_path>/.spec.lock`).
//! 3. For every dependency, in manifest order and up to `max_parallel` at a
//!    time:
//!    - pick the commit: the remote tip when fetching latest; else the
//!      lockfile's pin when the entry exists for the same version; else the
//!      cached commit when the cache was created for the same version; else
//!      the remote tip
//!    - [`Cache::ensure`] that commit
//!    - hash `<worktree>/<artifact_path>`
//! 4. Run [`conflict::detect_conflicts`] over the results; any conflict aborts.
//! 5. Build the lockfile from the results (stale entries drop out) and write
//!    it atomically when it changed.
//!
//! Results are collected with an order-preserving stream, so the lockfile
//! follows manifest order no matter which clone finishes first. Entries whose
//! commit and content hash are unchanged keep their `fetched_at`, which makes
//! a second resolve without upstream changes byte-identical to the first.
//!
//! A failure or cancellation anywhere leaves the previous lockfile in place.

pub mod conflict;
pub mod vendor;

pub use conflict::{Candidate, Conflict, ConflictKind, detect_conflicts};
pub use vendor::{VendorStats, clean_vendor, vendor};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::cache::{Cache, CheckoutTarget};
use crate::constants::{DEFAULT_ARTIFACT_PATH, DEFAULT_MAX_PARALLEL, LOCKFILE_FILE, MANIFEST_FILE};
use crate::core::{CancellationToken, SpecLedgerError, ensure_not_cancelled};
use crate::git::origin_url;
use crate::git::url::same_repository;
use crate::hashing::content_hash_async;
use crate::lockfile::{LockEntry, LockFile, VerifyIssue};
use crate::manifest::{Dependency, Manifest, Project};
use crate::utils::{ProjectLock, now_rfc3339};

/// Knobs for [`Resolver::resolve`].
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Move every selected dependency to the remote tip of its version
    pub fetch_latest: bool,
    /// Also check version conflicts against dependencies' own lockfiles
    pub deep: bool,
    pub max_parallel: usize,
    /// Restrict fetching to the dependency with this alias or URL
    pub filter: Option<String>,
    /// Re-clone selected cache entries from scratch
    pub force: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            fetch_latest: false,
            deep: false,
            max_parallel: DEFAULT_MAX_PARALLEL,
            filter: None,
            force: false,
        }
    }
}

/// What a resolve did.
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub lockfile: LockFile,
    /// `false` when the lockfile on disk was already identical
    pub written: bool,
    /// Aliases whose commit or content hash changed
    pub changed: Vec<String>,
    /// Lockfile entries dropped because the manifest no longer declares them
    pub removed: Vec<LockEntry>,
    pub warnings: Vec<String>,
}

enum Plan {
    Keep(LockEntry),
    Resolve {
        latest: bool,
        force: bool,
    },
}

struct Resolved {
    entry: LockEntry,
    changed: bool,
    warnings: Vec<String>,
}

/// Produces lockfiles from manifests.
#[derive(Debug, Clone)]
pub struct Resolver {
    cache: Cache,
}

impl Resolver {
    pub fn new(cache: Cache) -> Self {
        Self {
            cache,
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Resolve `project`'s manifest into its lockfile.
    ///
    /// # Errors
    ///
    /// - [`SpecLedgerError::InvalidManifest`] before any work starts
    /// - [`SpecLedgerError::NotFound`] when `filter` matches nothing
    /// - transport errors (`NetworkError`, `AuthError`, `RefNotFound`)
    /// - [`SpecLedgerError::ConflictError`] listing every conflict
    /// - [`SpecLedgerError::Cancelled`]
    pub async fn resolve(
        &self,
        project: &Project,
        options: &ResolveOptions,
        cancel: &CancellationToken,
    ) -> Result<ResolveOutcome> {
        let manifest = &project.manifest;
        manifest.ensure_valid()?;

        let _lock = ProjectLock::acquire(&project.artifact_dir()).await?;
        let lockfile_path = project.lockfile_path();
        let previous = LockFile::load(&lockfile_path)?;
        let project_url = origin_url(&project.root).await?;

        let selected = |dep: &Dependency| {
            options.filter.as_deref().is_none_or(|f| {
                dep.alias.as_deref() == Some(f) || same_repository(&dep.repository_url, f)
            })
        };
        if let Some(filter) = &options.filter
            && !manifest.dependencies.iter().any(|d| selected(d))
        {
            return Err(SpecLedgerError::NotFound {
                what: format!("dependency '{filter}'"),
            }
            .into());
        }

        let plans: Vec<Plan> = manifest
            .dependencies
            .iter()
            .map(|dep| {
                if selected(dep) {
                    return Plan::Resolve {
                        latest: options.fetch_latest,
                        force: options.force,
                    };
                }
                match previous.entry_for(dep) {
                    Some(prev) if prev.branch == dep.version => Plan::Keep(prev.clone()),
                    _ => Plan::Resolve {
                        latest: false,
                        force: false,
                    },
                }
            })
            .collect();

        info!(
            target: "resolver",
            "Resolving {} dependencies (max {} in parallel)",
            manifest.dependencies.len(),
            options.max_parallel.max(1)
        );

        let resolved: Vec<Resolved> = stream::iter(manifest.dependencies.iter().zip(plans))
            .map(|(dep, plan)| self.resolve_one(dep, plan, previous.entry_for(dep), cancel))
            .buffered(options.max_parallel.max(1))
            .try_collect()
            .await?;

        let mut candidates: Vec<Candidate> = manifest
            .dependencies
            .iter()
            .zip(&resolved)
            .map(|(dep, r)| Candidate::direct(dep, Some(&r.entry.commit_hash)))
            .collect();
        if options.deep {
            candidates.extend(self.transitive_candidates(manifest).await?);
        }
        let conflicts = detect_conflicts(&candidates, project_url.as_deref());
        if !conflicts.is_empty() {
            return Err(SpecLedgerError::ConflictError {
                conflicts,
            }
            .into());
        }

        ensure_not_cancelled(cancel, "resolve")?;

        let changed = manifest
            .dependencies
            .iter()
            .zip(&resolved)
            .filter(|(_, r)| r.changed)
            .map(|(dep, _)| dep.alias_or_empty().to_string())
            .collect();
        let removed: Vec<LockEntry> = previous
            .entries
            .iter()
            .filter(|e| !manifest.dependencies.iter().any(|d| e.matches(d)))
            .cloned()
            .collect();
        for entry in &removed {
            info!(target: "resolver", "Removing stale lockfile entry {} {}", entry.repository_url, entry.artifact_path);
        }

        let mut warnings = Vec::new();
        let mut entries = Vec::with_capacity(resolved.len());
        for r in resolved {
            warnings.extend(r.warnings);
            entries.push(r.entry);
        }
        let lockfile = LockFile::from_entries(entries);

        let written = lockfile != previous || !lockfile_path.exists();
        if written {
            lockfile.save(&lockfile_path)?;
            debug!(target: "resolver", "Wrote {}", lockfile_path.display());
        } else {
            debug!(target: "resolver", "{} already up to date", lockfile_path.display());
        }

        Ok(ResolveOutcome {
            lockfile,
            written,
            changed,
            removed,
            warnings,
        })
    }

    /// `resolve` with `fetch_latest`, limited to `filter` when given.
    pub async fn update(
        &self,
        project: &Project,
        filter: Option<String>,
        force: bool,
        max_parallel: usize,
        cancel: &CancellationToken,
    ) -> Result<ResolveOutcome> {
        let options = ResolveOptions {
            fetch_latest: true,
            deep: false,
            max_parallel,
            filter,
            force,
        };
        self.resolve(project, &options, cancel).await
    }

    async fn resolve_one(
        &self,
        dep: &Dependency,
        plan: Plan,
        previous: Option<&LockEntry>,
        cancel: &CancellationToken,
    ) -> Result<Resolved> {
        let alias = dep.alias_or_empty();
        let (latest, force) = match plan {
            Plan::Keep(entry) => {
                debug!(target: "resolver", "Keeping '{}' at {}", alias, entry.commit_hash);
                return Ok(Resolved {
                    entry,
                    changed: false,
                    warnings: Vec::new(),
                });
            }
            Plan::Resolve {
                latest,
                force,
            } => (latest, force),
        };

        let pinned = previous.filter(|p| p.branch == dep.version).map(|p| p.commit_hash.as_str());
        let target = match (latest, pinned) {
            (true, _) => CheckoutTarget::Latest,
            (false, Some(commit)) => CheckoutTarget::Pinned(commit),
            (false, None) => CheckoutTarget::Cached,
        };
        debug!(target: "resolver", "Resolving '{}' ({}) with {:?}", alias, dep.version, target);

        // `cached` holds the entry lock until the tree is hashed.
        let cached = self
            .cache
            .ensure(dep, target, force, cancel)
            .await
            .with_context(|| format!("Failed to resolve dependency '{alias}'"))?;

        let digest = content_hash_async(cached.worktree.join(&dep.artifact_path))
            .await
            .with_context(|| format!("Failed to hash '{alias}' at {}", dep.artifact_path))?;

        let unchanged = previous.is_some_and(|p| {
            p.commit_hash == cached.commit && p.content_hash == digest.content_hash && p.branch == dep.version
        });
        let fetched_at = match previous {
            Some(p) if unchanged => p.fetched_at.clone(),
            _ => now_rfc3339(),
        };

        Ok(Resolved {
            entry: LockEntry {
                repository_url: dep.repository_url.clone(),
                branch: dep.version.clone(),
                commit_hash: cached.commit,
                artifact_path: dep.artifact_path.clone(),
                content_hash: digest.content_hash,
                size: digest.size,
                fetched_at,
            },
            changed: !unchanged,
            warnings: cached.warnings,
        })
    }

    /// Pins recorded in cached dependencies' own `spec.mod`/`spec.sum`.
    async fn transitive_candidates(&self, manifest: &Manifest) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();
        for dep in &manifest.dependencies {
            if self.cache.locate(dep).is_none() {
                continue;
            }
            let _lock = self.cache.read_lock(dep).await?;
            let Some(worktree) = self.cache.locate(dep) else {
                continue;
            };
            let artifact_dir = worktree.join(DEFAULT_ARTIFACT_PATH);
            let manifest_path = artifact_dir.join(MANIFEST_FILE);
            if !manifest_path.is_file() {
                continue;
            }
            let loaded = Manifest::load(&manifest_path)
                .and_then(|m| LockFile::load(&artifact_dir.join(LOCKFILE_FILE)).map(|l| (m, l)));
            let (inner_manifest, inner_lockfile) = match loaded {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(target: "resolver", "Skipping nested manifest of '{}': {:#}", dep.alias_or_empty(), e);
                    continue;
                }
            };
            let origin = format!("{}/{}", dep.alias_or_empty(), LOCKFILE_FILE);
            for (alias, (inner_dep, entry)) in inner_lockfile.by_alias(&inner_manifest) {
                candidates.push(Candidate {
                    alias: alias.to_string(),
                    repository_url: inner_dep.repository_url.clone(),
                    artifact_path: inner_dep.artifact_path.clone(),
                    commit: Some(entry.commit_hash.clone()),
                    origin: origin.clone(),
                    transitive: true,
                });
            }
        }
        Ok(candidates)
    }

    /// Conflict detection without resolving; commits come from the lockfile.
    pub async fn check(&self, project: &Project, deep: bool) -> Result<Vec<Conflict>> {
        let lockfile = LockFile::load(&project.lockfile_path())?;
        let project_url = origin_url(&project.root).await?;
        let mut candidates: Vec<Candidate> = project
            .manifest
            .dependencies
            .iter()
            .map(|dep| Candidate::direct(dep, lockfile.entry_for(dep).map(|e| e.commit_hash.as_str())))
            .collect();
        if deep {
            candidates.extend(self.transitive_candidates(&project.manifest).await?);
        }
        Ok(detect_conflicts(&candidates, project_url.as_deref()))
    }

    /// Re-hash cached artifacts at their locked commits and compare with the
    /// lockfile. Dependencies that were never fetched are reported, not fetched.
    pub async fn verify_content(
        &self,
        project: &Project,
        lockfile: &LockFile,
        cancel: &CancellationToken,
    ) -> Result<Vec<VerifyIssue>> {
        let mut issues = Vec::new();
        for (alias, (dep, entry)) in lockfile.by_alias(&project.manifest) {
            if self.cache.locate(dep).is_none() {
                issues.push(VerifyIssue::NotCached {
                    alias: alias.to_string(),
                });
                continue;
            }
            let cached = self
                .cache
                .ensure(dep, CheckoutTarget::Pinned(&entry.commit_hash), false, cancel)
                .await
                .with_context(|| format!("Failed to check out '{alias}' at {}", entry.commit_hash))?;
            let digest = content_hash_async(cached.worktree.join(&dep.artifact_path)).await?;
            if digest.content_hash != entry.content_hash {
                issues.push(VerifyIssue::ContentMismatch {
                    alias: alias.to_string(),
                    expected: entry.content_hash.clone(),
                    actual: digest.content_hash,
                });
            }
        }
        Ok(issues)
    }
}
