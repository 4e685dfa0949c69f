//! User-wide cache of dependency clones
//!
//! Every dependency is cloned once into a directory under the cache root and
//! reused by every project of the user. The cache root is
//! `${SPECLEDGER_CACHE_DIR:-$HOME/.specledger/cache}` unless configured
//! otherwise (see [`crate::config`]).
//!
//! # Directory Structure
//!
//! ```text
//! ~/.specledger/cache/
//! ├── api/                  # entry named after the dependency alias
//! │   ├── .lock             # advisory lock serialising access to this entry
//! │   ├── .partial          # present only while (or after a failed) clone
//! │   ├── metadata.json     # {repository_url, branch, commit_hash, last_accessed}
//! │   └── repo/             # standard git working tree
//! └── https-github-com-o-r/ # entry for a dependency without alias
//! ```
//!
//! Keeping the bookkeeping files beside `repo/` means the working tree, and
//! therefore the content hash of any artifact path inside it, only ever
//! contains files from the dependency repository.
//!
//! # Concurrency
//!
//! [`Cache::ensure`] holds the entry's [`FileLock`] for its whole duration,
//! including the metadata write. Different entries are independent and can
//! be ensured in parallel from one or many processes.
//!
//! # Failure Recovery
//!
//! - A `.partial` marker left by an interrupted clone causes the working tree
//!   to be removed before the next clone attempt.
//! - An entry whose `repo/.git` is missing, whose metadata cannot be read, or
//!   which belongs to another repository is considered corrupt and re-cloned
//!   once with a warning.

pub mod lock;
pub mod metadata;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::constants::{DEFAULT_LOCK_TIMEOUT, DEFAULT_STALE_LOCK_AGE};
use crate::core::{CancellationToken, SpecLedgerError, ensure_not_cancelled, find_error};
use crate::git::url::{same_repository, strip_auth_from_url, url_slug};
use crate::git::{GitTransport, is_valid_git_repo};
use crate::manifest::Dependency;
use crate::utils::{ensure_dir, remove_dir_if_exists};

pub use lock::FileLock;
pub use metadata::{CacheMetadata, METADATA_FILE};

/// Lock file inside each entry directory.
pub const LOCK_FILE: &str = ".lock";

/// Marker for a clone that has not completed.
pub const PARTIAL_MARKER: &str = ".partial";

/// Working tree directory inside each entry directory.
pub const WORKTREE_DIR: &str = "repo";

/// Which commit [`Cache::ensure`] should leave checked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutTarget<'a> {
    /// Exactly this commit, fetching if it is not present locally
    Pinned(&'a str),
    /// Whatever the entry already has when it was created for the same
    /// version, else the remote tip of the version
    Cached,
    /// The remote tip of the dependency's version
    Latest,
}

/// A cache entry ready for reading.
///
/// The entry lock is held for as long as this value lives, so the working
/// tree stays at `commit` until it is dropped. Keep it alive while reading
/// `worktree` and drop it before ensuring the same entry again.
#[derive(Debug)]
pub struct CacheEntry {
    /// Directory name under the cache root
    pub name: String,
    /// `<root>/<name>`
    pub dir: PathBuf,
    /// `<root>/<name>/repo`
    pub worktree: PathBuf,
    /// Commit checked out in the working tree
    pub commit: String,
    pub metadata: CacheMetadata,
    /// Non-fatal observations from git (e.g. plain http remotes)
    pub warnings: Vec<String>,
    _lock: FileLock,
}

/// Summary of one entry for `cache info`.
#[derive(Debug, Clone)]
pub struct CacheEntryInfo {
    pub name: String,
    pub metadata: Option<CacheMetadata>,
    pub size: u64,
}

/// State of an existing, healthy entry.
struct EntryState {
    metadata: CacheMetadata,
    head: String,
}

/// Process-safe store of dependency working trees.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
    transport: GitTransport,
    lock_timeout: Duration,
    stale_lock_age: Duration,
}

impl Cache {
    /// Cache rooted at `root` with default transport and lock thresholds.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            transport: GitTransport::new(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            stale_lock_age: DEFAULT_STALE_LOCK_AGE,
        }
    }

    /// Cache configured from merged [`Settings`].
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.cache_dir.clone())
            .with_transport(GitTransport::new().with_ssh_key(settings.ssh_key.clone()))
            .with_stale_lock_age(settings.stale_lock_age)
            .with_lock_timeout(settings.lock_timeout)
    }

    #[must_use]
    pub fn with_transport(mut self, transport: GitTransport) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub fn with_stale_lock_age(mut self, age: Duration) -> Self {
        self.stale_lock_age = age;
        self
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn transport(&self) -> &GitTransport {
        &self.transport
    }

    /// Directory name for `dep`: its alias, else a slug of its URL.
    #[must_use]
    pub fn entry_name(dep: &Dependency) -> String {
        match dep.alias.as_deref().filter(|a| !a.is_empty()) {
            Some(alias) => alias.to_string(),
            None => url_slug(&dep.repository_url),
        }
    }

    pub fn entry_dir(&self, dep: &Dependency) -> PathBuf {
        self.root.join(Self::entry_name(dep))
    }

    /// Make sure the entry for `dep` exists and has `target` checked out.
    ///
    /// A missing entry is cloned at `dep.version`. An existing entry whose
    /// recorded commit already satisfies `target` is returned unchanged;
    /// otherwise it is fetched and checked out. With `force` the entry is
    /// re-cloned from scratch. The sidecar metadata is rewritten before the
    /// entry lock is released.
    pub async fn ensure(
        &self,
        dep: &Dependency,
        target: CheckoutTarget<'_>,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<CacheEntry> {
        ensure_not_cancelled(cancel, "cache ensure")?;

        let name = Self::entry_name(dep);
        let dir = self.root.join(&name);
        let worktree = dir.join(WORKTREE_DIR);
        ensure_dir(&dir)?;

        let lock = self.lock_entry(&dir, &name).await?;

        if force {
            debug!(target: "cache", "Forcing fresh clone of '{}'", name);
            wipe_entry(&dir)?;
        } else if dir.join(PARTIAL_MARKER).exists() {
            warn!(target: "cache", "Removing incomplete clone in cache entry '{}'", name);
            wipe_entry(&dir)?;
        }

        let state = if worktree.exists() {
            match self.inspect(dep, &dir, &worktree, cancel).await {
                Ok(state) => Some(state),
                Err(e) if matches!(find_error(&e), Some(SpecLedgerError::CacheCorrupt { .. })) => {
                    warn!(target: "cache", "Re-cloning cache entry '{}': {}", name, e);
                    wipe_entry(&dir)?;
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let mut warnings = Vec::new();
        let commit = match state {
            Some(state) => self.refresh(dep, &worktree, &state, target, cancel).await?,
            None => self.clone_entry(dep, &dir, &worktree, target, &mut warnings, cancel).await?,
        };

        let metadata = CacheMetadata {
            repository_url: dep.repository_url.clone(),
            branch: dep.version.clone(),
            commit_hash: commit.clone(),
            last_accessed: crate::utils::now_rfc3339(),
        };
        metadata.save(&dir)?;

        Ok(CacheEntry {
            name,
            dir,
            worktree,
            commit,
            metadata,
            warnings,
            _lock: lock,
        })
    }

    /// Take the entry lock for `dep` without touching the working tree.
    ///
    /// Readers that only need whatever is checked out (nested manifests in
    /// deep mode) hold this while they read.
    pub async fn read_lock(&self, dep: &Dependency) -> Result<FileLock> {
        let name = Self::entry_name(dep);
        self.lock_entry(&self.root.join(&name), &name).await
    }

    async fn lock_entry(&self, dir: &Path, name: &str) -> Result<FileLock> {
        FileLock::acquire(&dir.join(LOCK_FILE), self.lock_timeout, Some(self.stale_lock_age))
            .await
            .with_context(|| format!("Failed to lock cache entry '{name}'"))
    }

    async fn inspect(
        &self,
        dep: &Dependency,
        dir: &Path,
        worktree: &Path,
        cancel: &CancellationToken,
    ) -> Result<EntryState> {
        let corrupt = |reason: &str| -> anyhow::Error {
            SpecLedgerError::CacheCorrupt {
                path: dir.display().to_string(),
                reason: reason.to_string(),
            }
            .into()
        };

        if !is_valid_git_repo(worktree) {
            return Err(corrupt("missing .git"));
        }
        let Some(metadata) = CacheMetadata::load(dir)? else {
            return Err(corrupt("missing metadata"));
        };
        if !same_repository(&metadata.repository_url, &dep.repository_url) {
            return Err(corrupt(&format!(
                "entry belongs to {}",
                strip_auth_from_url(&metadata.repository_url)
            )));
        }

        let head = match self.transport.resolve_head(worktree, cancel).await {
            Ok(head) => head,
            Err(e) if matches!(find_error(&e), Some(SpecLedgerError::GitCommandError { .. })) => {
                return Err(corrupt("HEAD is unreadable"));
            }
            Err(e) => return Err(e),
        };

        Ok(EntryState {
            metadata,
            head,
        })
    }

    async fn refresh(
        &self,
        dep: &Dependency,
        worktree: &Path,
        state: &EntryState,
        target: CheckoutTarget<'_>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        match target {
            CheckoutTarget::Pinned(commit) => {
                if state.head == commit && state.metadata.commit_hash == commit {
                    debug!(target: "cache", "Cache entry for {} already at {}", dep.repository_url, commit);
                    return Ok(commit.to_string());
                }
                if let Err(e) = self.transport.checkout(worktree, commit, cancel).await {
                    if !matches!(find_error(&e), Some(SpecLedgerError::RefNotFound { .. })) {
                        return Err(e);
                    }
                    self.transport.fetch(worktree, cancel).await?;
                    self.transport.checkout(worktree, commit, cancel).await?;
                }
                self.transport.resolve_head(worktree, cancel).await
            }
            CheckoutTarget::Cached if state.metadata.branch == dep.version => {
                debug!(target: "cache", "Keeping cached {} at {}", dep.repository_url, state.head);
                Ok(state.head.clone())
            }
            CheckoutTarget::Cached | CheckoutTarget::Latest => {
                let head = self.transport.pull(worktree, &dep.version, cancel).await?;
                if head != state.head {
                    info!(
                        target: "cache",
                        "Updated {} from {} to {}",
                        strip_auth_from_url(&dep.repository_url),
                        short(&state.head),
                        short(&head)
                    );
                }
                Ok(head)
            }
        }
    }

    async fn clone_entry(
        &self,
        dep: &Dependency,
        dir: &Path,
        worktree: &Path,
        target: CheckoutTarget<'_>,
        warnings: &mut Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let marker = dir.join(PARTIAL_MARKER);
        std::fs::write(&marker, b"")
            .map_err(SpecLedgerError::IoError)
            .with_context(|| format!("Failed to create {}", marker.display()))?;

        debug!(target: "cache", "Cloning {} into {}", strip_auth_from_url(&dep.repository_url), dir.display());
        let outcome = self
            .transport
            .clone(&dep.repository_url, Some(&dep.version), worktree, false, cancel)
            .await?;
        warnings.extend(outcome.warnings);

        let commit = match target {
            CheckoutTarget::Pinned(pinned) if pinned != outcome.commit => {
                self.transport.checkout(worktree, pinned, cancel).await?;
                self.transport.resolve_head(worktree, cancel).await?
            }
            _ => outcome.commit,
        };

        std::fs::remove_file(&marker)
            .map_err(SpecLedgerError::IoError)
            .with_context(|| format!("Failed to remove {}", marker.display()))?;
        Ok(commit)
    }

    /// Working tree for `dep` when a completed clone exists.
    pub fn locate(&self, dep: &Dependency) -> Option<PathBuf> {
        let dir = self.entry_dir(dep);
        let worktree = dir.join(WORKTREE_DIR);
        (is_valid_git_repo(&worktree) && !dir.join(PARTIAL_MARKER).exists()).then_some(worktree)
    }

    /// Remove entries whose name is not in `active`. Entries currently locked
    /// by another operation are skipped. Returns the removed names, sorted.
    pub async fn prune(&self, active: &HashSet<String>) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for name in self.entry_names()? {
            if active.contains(&name) {
                continue;
            }
            let dir = self.root.join(&name);
            let lock = match FileLock::acquire(&dir.join(LOCK_FILE), Duration::ZERO, None).await {
                Ok(lock) => lock,
                Err(e) if matches!(find_error(&e), Some(SpecLedgerError::LockTimeout { .. })) => {
                    warn!(target: "cache", "Skipping cache entry '{}': in use", name);
                    continue;
                }
                Err(e) => return Err(e),
            };
            remove_dir_if_exists(&dir)?;
            drop(lock);
            info!(target: "cache", "Pruned cache entry '{}'", name);
            removed.push(name);
        }
        Ok(removed)
    }

    /// Remove the whole cache root.
    pub fn clean(&self) -> Result<()> {
        remove_dir_if_exists(&self.root)?;
        info!(target: "cache", "Removed cache root {}", self.root.display());
        Ok(())
    }

    /// Bytes used by every file under the cache root.
    pub async fn size(&self) -> Result<u64> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || directory_size(&root))
            .await
            .context("spawn_blocking panicked")?
    }

    /// All entries with their metadata (when readable) and size, by name.
    pub async fn list_entries(&self) -> Result<Vec<CacheEntryInfo>> {
        let mut infos = Vec::new();
        for name in self.entry_names()? {
            let dir = self.root.join(&name);
            let metadata = CacheMetadata::load(&dir).ok().flatten();
            let size = tokio::task::spawn_blocking(move || directory_size(&dir))
                .await
                .context("spawn_blocking panicked")??;
            infos.push(CacheEntryInfo {
                name,
                metadata,
                size,
            });
        }
        Ok(infos)
    }

    fn entry_names(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)
            .map_err(SpecLedgerError::IoError)
            .with_context(|| format!("Failed to read cache directory {}", self.root.display()))?
        {
            let entry = entry.context("Failed to read cache directory entry")?;
            if entry.file_type().is_ok_and(|t| t.is_dir())
                && let Some(name) = entry.file_name().to_str()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn wipe_entry(dir: &Path) -> Result<()> {
    remove_dir_if_exists(&dir.join(WORKTREE_DIR))?;
    for file in [METADATA_FILE, PARTIAL_MARKER] {
        match std::fs::remove_file(dir.join(file)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(SpecLedgerError::IoError(e))
                    .with_context(|| format!("Failed to remove {}", dir.join(file).display()));
            }
        }
    }
    Ok(())
}

fn directory_size(root: &Path) -> Result<u64> {
    if !root.exists() {
        return Ok(0);
    }
    let mut total = 0;
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if entry.file_type().is_file() {
            total += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    Ok(total)
}

fn short(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}
