//! Git transport for SpecLedger
//!
//! This module drives the system `git` binary through [`GitCommand`] rather than
//! an embedded Git implementation. The system binary already understands the
//! user's SSH agent, credential helpers and `~/.gitconfig`, and every
//! invocation is an async subprocess that can be cancelled or timed out.
//!
//! # Operations
//!
//! [`GitTransport`] exposes the operations the cache store needs:
//!
//! | Operation | Behaviour |
//! |-----------|-----------|
//! | [`clone`](GitTransport::clone) | single-branch clone (depth 1 when shallow) |
//! | [`fetch`](GitTransport::fetch) | update `origin` remote-tracking refs and tags |
//! | [`checkout`](GitTransport::checkout) | commit, else local branch, else `origin/<ref>`, else tag |
//! | [`pull`](GitTransport::pull) | fetch, then move to the remote tip of a version |
//! | [`resolve_remote`](GitTransport::resolve_remote) | fetch, then SHA of `refs/remotes/origin/<branch>` |
//! | [`resolve_head`](GitTransport::resolve_head) | SHA of `HEAD` |
//!
//! Every operation takes a [`CancellationToken`]. A cancelled clone leaves
//! whatever git wrote in the target directory; the caller owns removing it.
//!
//! # Authentication
//!
//! Auth is chosen from the URL alone, see [`auth::select_auth`]. `git@` URLs use
//! the first readable key among `~/.ssh/id_ed25519`, `id_rsa`, `id_ecdsa` via
//! `GIT_SSH_COMMAND`; everything else relies on the environment.
//!
//! # Errors
//!
//! Failures surface as [`SpecLedgerError`] kinds: `NetworkError`, `AuthError`,
//! `RefNotFound`, `AlreadyExists`, `Cancelled`, or `GitCommandError` when git's
//! output could not be classified.

pub mod auth;
pub mod command_builder;
pub mod url;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_BRANCH, GIT_CLONE_TIMEOUT, GIT_FETCH_TIMEOUT, GIT_LOCAL_TIMEOUT};
use crate::core::{CancellationToken, SpecLedgerError, find_error};
pub use auth::AuthStrategy;
pub use command_builder::GitCommand;

/// Result of a successful clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOutcome {
    /// Commit checked out after the clone
    pub commit: String,
    /// Non-fatal observations worth surfacing to the user
    pub warnings: Vec<String>,
}

/// Clone/fetch/checkout against remote repositories.
#[derive(Debug, Clone, Default)]
pub struct GitTransport {
    ssh_dir: Option<PathBuf>,
    preferred_key: Option<PathBuf>,
}

impl GitTransport {
    /// Transport probing keys under `~/.ssh`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ssh_dir: auth::default_ssh_dir(),
            preferred_key: None,
        }
    }

    /// Try `key` before the default probe list.
    #[must_use]
    pub fn with_ssh_key(mut self, key: Option<PathBuf>) -> Self {
        self.preferred_key = key;
        self
    }

    #[must_use]
    pub fn with_ssh_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.ssh_dir = dir;
        self
    }

    fn auth_for(&self, url: &str) -> AuthStrategy {
        auth::select_auth(url, self.ssh_dir.as_deref(), self.preferred_key.as_deref())
    }

    /// Clone `url` at `branch` (default `main`) into `target`.
    ///
    /// A full commit SHA as `branch` clones the default branch history and then
    /// detaches at that commit; `shallow` is ignored in that case. The clone is
    /// widened afterwards so later fetches see every branch.
    pub async fn clone(
        &self,
        url: &str,
        branch: Option<&str>,
        target: &Path,
        shallow: bool,
        cancel: &CancellationToken,
    ) -> Result<CloneOutcome> {
        url::validate_git_url(url)?;

        if target.exists()
            && std::fs::read_dir(target)
                .with_context(|| format!("Failed to read {}", target.display()))?
                .next()
                .is_some()
        {
            return Err(SpecLedgerError::AlreadyExists {
                path: target.display().to_string(),
            }
            .into());
        }

        let branch = branch.filter(|b| !b.is_empty()).unwrap_or(DEFAULT_BRANCH);
        let mut warnings = Vec::new();
        let pinned_commit = is_commit_sha(branch);

        if pinned_commit && shallow {
            warnings.push(format!("shallow clone disabled: '{branch}' is a commit SHA"));
        }
        if url.starts_with("http://") {
            warnings.push(format!("{} uses unencrypted http", url::strip_auth_from_url(url)));
        }

        let clone_branch = if pinned_commit { None } else { Some(branch) };
        GitCommand::clone(url, clone_branch, target, shallow && !pinned_commit)
            .envs(self.auth_for(url).git_env())
            .with_timeout(Some(GIT_CLONE_TIMEOUT))
            .with_cancellation(cancel)
            .with_context("clone")
            .execute_success()
            .await?;

        GitCommand::track_all_branches()
            .current_dir(target)
            .with_timeout(Some(GIT_LOCAL_TIMEOUT))
            .with_cancellation(cancel)
            .execute_success()
            .await?;

        if pinned_commit {
            self.checkout(target, branch, cancel).await?;
        }

        let commit = self.resolve_head(target, cancel).await?;
        tracing::debug!(target: "git", "Cloned {} at {}", url::strip_auth_from_url(url), commit);

        Ok(CloneOutcome {
            commit,
            warnings,
        })
    }

    /// Update remote-tracking refs for `origin`. Being up to date is not an error.
    pub async fn fetch(&self, repo_dir: &Path, cancel: &CancellationToken) -> Result<()> {
        let url = origin_url(repo_dir).await?.unwrap_or_default();

        GitCommand::fetch()
            .current_dir(repo_dir)
            .envs(self.auth_for(&url).git_env())
            .with_remote(url::strip_auth_from_url(&url))
            .with_timeout(Some(GIT_FETCH_TIMEOUT))
            .with_cancellation(cancel)
            .with_context("fetch")
            .execute_success()
            .await
    }

    /// Force a clean checkout of `reference`.
    ///
    /// Resolution order: 40-hex commit, local branch, `origin/<reference>`
    /// (resetting the local branch to it), then tag.
    pub async fn checkout(
        &self,
        repo_dir: &Path,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let command = if is_commit_sha(reference) {
            if self.ref_commit(repo_dir, reference, cancel).await?.is_none() {
                return Err(ref_not_found(repo_dir, reference).await);
            }
            GitCommand::checkout_detached(reference)
        } else if self.ref_commit(repo_dir, &format!("refs/heads/{reference}"), cancel).await?.is_some() {
            GitCommand::checkout_local_branch(reference)
        } else if self
            .ref_commit(repo_dir, &format!("refs/remotes/origin/{reference}"), cancel)
            .await?
            .is_some()
        {
            GitCommand::checkout_branch(reference, &format!("origin/{reference}"))
        } else if self.ref_commit(repo_dir, &format!("refs/tags/{reference}"), cancel).await?.is_some() {
            GitCommand::checkout_detached(&format!("refs/tags/{reference}"))
        } else {
            return Err(ref_not_found(repo_dir, reference).await);
        };

        command
            .current_dir(repo_dir)
            .with_timeout(Some(GIT_LOCAL_TIMEOUT))
            .with_cancellation(cancel)
            .with_context("checkout")
            .execute_success()
            .await?;

        self.clean_worktree(repo_dir, cancel).await
    }

    /// Fetch, then move the working tree to the newest commit for `version`.
    ///
    /// Branches follow `origin/<version>`; tags and SHAs are checked out as-is.
    /// Returns the new `HEAD`.
    pub async fn pull(
        &self,
        repo_dir: &Path,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.fetch(repo_dir, cancel).await?;

        let remote_ref = format!("refs/remotes/origin/{version}");
        if !is_commit_sha(version) && self.ref_commit(repo_dir, &remote_ref, cancel).await?.is_some() {
            GitCommand::checkout_branch(version, &format!("origin/{version}"))
                .current_dir(repo_dir)
                .with_timeout(Some(GIT_LOCAL_TIMEOUT))
                .with_cancellation(cancel)
                .with_context("pull")
                .execute_success()
                .await?;
            self.clean_worktree(repo_dir, cancel).await?;
        } else {
            self.checkout(repo_dir, version, cancel).await?;
        }

        self.resolve_head(repo_dir, cancel).await
    }

    /// Fetch, then return the SHA of `refs/remotes/origin/<branch>`.
    pub async fn resolve_remote(
        &self,
        repo_dir: &Path,
        branch: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.fetch(repo_dir, cancel).await?;
        match self.ref_commit(repo_dir, &format!("refs/remotes/origin/{branch}"), cancel).await? {
            Some(commit) => Ok(commit),
            None => Err(ref_not_found(repo_dir, branch).await),
        }
    }

    pub async fn resolve_head(&self, repo_dir: &Path, cancel: &CancellationToken) -> Result<String> {
        GitCommand::current_commit()
            .current_dir(repo_dir)
            .with_timeout(Some(GIT_LOCAL_TIMEOUT))
            .with_cancellation(cancel)
            .execute_stdout()
            .await
            .with_context(|| format!("Failed to read HEAD in {}", repo_dir.display()))
    }

    /// Commit a ref points at, or `None` when it does not exist.
    async fn ref_commit(
        &self,
        repo_dir: &Path,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let result = GitCommand::verify_ref(reference)
            .current_dir(repo_dir)
            .with_timeout(Some(GIT_LOCAL_TIMEOUT))
            .with_cancellation(cancel)
            .execute_stdout()
            .await;
        match result {
            Ok(sha) if !sha.is_empty() => Ok(Some(sha)),
            Ok(_) => Ok(None),
            Err(e) => match find_error(&e) {
                Some(SpecLedgerError::Cancelled {
                    ..
                } | SpecLedgerError::GitNotFound) => Err(e),
                _ => Ok(None),
            },
        }
    }

    async fn clean_worktree(&self, repo_dir: &Path, cancel: &CancellationToken) -> Result<()> {
        GitCommand::new()
            .args(["clean", "-ffdx"])
            .current_dir(repo_dir)
            .with_timeout(Some(GIT_LOCAL_TIMEOUT))
            .with_cancellation(cancel)
            .execute_success()
            .await
    }
}

async fn ref_not_found(repo_dir: &Path, reference: &str) -> anyhow::Error {
    let url = origin_url(repo_dir)
        .await
        .ok()
        .flatten()
        .map_or_else(|| repo_dir.display().to_string(), |u| url::strip_auth_from_url(&u));
    SpecLedgerError::RefNotFound {
        reference: reference.to_string(),
        url,
    }
    .into()
}

/// `origin` URL of the repository at `dir`, or `None` when `dir` is not a git
/// checkout or has no `origin`.
pub async fn origin_url(dir: &Path) -> Result<Option<String>> {
    if !dir.exists() {
        return Ok(None);
    }
    match GitCommand::remote_url()
        .current_dir(dir)
        .with_timeout(Some(GIT_LOCAL_TIMEOUT))
        .execute_stdout()
        .await
    {
        Ok(url) if !url.is_empty() => Ok(Some(url)),
        Ok(_) => Ok(None),
        Err(e) => match find_error(&e) {
            Some(SpecLedgerError::GitNotFound) => Err(e),
            _ => Ok(None),
        },
    }
}

/// Exactly 40 hex characters.
#[must_use]
pub fn is_commit_sha(s: &str) -> bool {
    s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// `path/.git` exists.
#[must_use]
pub fn is_valid_git_repo(path: &Path) -> bool {
    path.join(".git").exists()
}

/// Fail with [`SpecLedgerError::GitNotFound`] unless `git` is on `PATH`.
pub fn ensure_git_available() -> Result<()> {
    if which::which("git").is_err() {
        return Err(SpecLedgerError::GitNotFound.into());
    }
    Ok(())
}
