//! Fluent builder for `git` subprocess invocations
//!
//! Every invocation:
//! - runs `git -C <dir> ...` so the process working directory is irrelevant;
//! - disables interactive credential prompts (`GIT_TERMINAL_PROMPT=0`);
//! - is bounded by a timeout and, when one is attached, a [`CancellationToken`];
//! - is killed when cancelled or timed out (`kill_on_drop`);
//! - maps failures to a [`SpecLedgerError`] kind by inspecting stderr.
//!
//! ```rust,no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use specledger::git::command_builder::GitCommand;
//!
//! let head = GitCommand::current_commit()
//!     .current_dir("/path/to/repo")
//!     .execute_stdout()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::core::{CancellationToken, SpecLedgerError};

pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    timeout_duration: Option<Duration>,
    cancel: Option<CancellationToken>,
    context: Option<String>,
    /// Remote URL for error messages, when the command talks to a remote
    remote_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            // Default timeout of 5 minutes for most git operations
            timeout_duration: Some(Duration::from_secs(300)),
            cancel: None,
            context: None,
            remote_url: None,
        }
    }
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Apply a batch of environment variables (e.g. from an auth strategy).
    pub fn envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env_vars.extend(vars);
        self
    }

    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    pub fn with_cancellation(mut self, token: &CancellationToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_remote(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    /// The git subcommand (first argument).
    fn operation(&self) -> String {
        self.args.first().cloned().unwrap_or_else(|| "unknown".to_string())
    }

    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());

        let ctx = self.context.as_deref().unwrap_or("git");
        tracing::debug!(target: "git", "({}) Executing command: git {}", ctx, full_args.join(" "));

        if let Some(token) = &self.cancel {
            crate::core::ensure_not_cancelled(token, &format!("git {}", self.operation()))?;
        }

        let mut cmd = Command::new("git");
        cmd.args(&full_args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.env_vars {
            tracing::trace!(target: "git", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                anyhow::Error::from(SpecLedgerError::GitNotFound)
            } else {
                anyhow::Error::from(e).context(format!("Failed to spawn git {}", full_args.join(" ")))
            }
        })?;

        let operation = self.operation();
        let output_future = child.wait_with_output();
        let timed = async {
            match self.timeout_duration {
                Some(duration) => tokio::time::timeout(duration, output_future).await.ok(),
                None => Some(output_future.await),
            }
        };

        let cancel = self.cancel.clone().unwrap_or_default();
        let output = tokio::select! {
            result = timed => match result {
                Some(output) => output.with_context(|| format!("Failed to execute git {}", full_args.join(" ")))?,
                None => {
                    let secs = self.timeout_duration.map_or(0, |d| d.as_secs());
                    tracing::warn!(target: "git", "Command timed out after {} seconds: git {}", secs, full_args.join(" "));
                    let reason = format!("git {operation} timed out after {secs} seconds");
                    return Err(match &self.remote_url {
                        Some(url) => SpecLedgerError::NetworkError { url: url.clone(), reason },
                        None => SpecLedgerError::GitCommandError { operation, stderr: reason },
                    }
                    .into());
                }
            },
            () = cancel.cancelled() => {
                tracing::debug!(target: "git", "({}) Cancelled: git {}", ctx, full_args.join(" "));
                return Err(SpecLedgerError::Cancelled { operation: format!("git {operation}") }.into());
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(target: "git", "Command failed with exit code: {:?}", output.status.code());
            if !stderr.is_empty() {
                tracing::debug!(target: "git", "Error: {}", stderr.trim());
            }
            return Err(classify_failure(&operation, &self.args, self.remote_url.as_deref(), &stderr).into());
        }

        if !stdout.is_empty() {
            tracing::trace!(target: "git", "({}) {}", ctx, stdout.trim());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "git::perf", "({}) Git {} took {:.2}s", ctx, operation, elapsed.as_secs_f64());
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(target: "git::perf", "({}) Git {} took {}ms", ctx, operation, elapsed.as_millis());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Turn a failed git invocation into the most specific error kind.
fn classify_failure(
    operation: &str,
    args: &[String],
    remote_url: Option<&str>,
    stderr: &str,
) -> SpecLedgerError {
    let lower = stderr.to_lowercase();
    let url = remote_url.unwrap_or("local repository").to_string();
    let reason = stderr.trim().to_string();

    const AUTH_MARKERS: [&str; 6] = [
        "authentication failed",
        "permission denied (publickey",
        "could not read username",
        "could not read password",
        "terminal prompts disabled",
        "host key verification failed",
    ];
    const REF_MARKERS: [&str; 7] = [
        "remote branch",
        "couldn't find remote ref",
        "did not match any",
        "unknown revision",
        "invalid reference",
        "not a valid object name",
        "needed a single revision",
    ];
    const NETWORK_MARKERS: [&str; 8] = [
        "could not resolve host",
        "connection refused",
        "connection timed out",
        "network is unreachable",
        "unable to access",
        "could not read from remote repository",
        "does not appear to be a git repository",
        "repository not found",
    ];

    if lower.contains("already exists and is not an empty directory") {
        let path = args.last().cloned().unwrap_or_default();
        return SpecLedgerError::AlreadyExists {
            path,
        };
    }
    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        return SpecLedgerError::AuthError {
            url,
            reason,
        };
    }
    if REF_MARKERS.iter().any(|m| lower.contains(m)) {
        let reference = requested_ref(operation, args).unwrap_or_else(|| "unknown".to_string());
        return SpecLedgerError::RefNotFound {
            reference,
            url,
        };
    }
    if remote_url.is_some() && NETWORK_MARKERS.iter().any(|m| lower.contains(m)) {
        return SpecLedgerError::NetworkError {
            url,
            reason,
        };
    }

    SpecLedgerError::GitCommandError {
        operation: operation.to_string(),
        stderr: reason,
    }
}

/// Best-effort extraction of the ref a command asked for.
fn requested_ref(operation: &str, args: &[String]) -> Option<String> {
    match operation {
        "clone" => args.windows(2).find(|w| w[0] == "--branch").map(|w| w[1].clone()),
        _ => args.iter().skip(1).rev().find(|a| !a.starts_with('-')).cloned(),
    }
}

// Convenience builders for common Git operations

impl GitCommand {
    /// `git clone [--single-branch --branch b] [--depth 1] url target`
    pub fn clone(url: &str, branch: Option<&str>, target: impl AsRef<Path>, shallow: bool) -> Self {
        let mut cmd = Self::new().arg("clone");
        if let Some(branch) = branch {
            cmd = cmd.args(["--single-branch", "--branch", branch]);
        }
        if shallow {
            cmd = cmd.args(["--depth", "1"]);
        }
        cmd.args([url.to_string(), target.as_ref().display().to_string()]).with_remote(url)
    }

    /// Update every remote-tracking ref and tag from `origin`, pruning removed branches.
    pub fn fetch() -> Self {
        Self::new().args(["fetch", "origin", "--tags", "--force", "--prune"])
    }

    /// Widen a single-branch clone so later fetches track every branch.
    pub fn track_all_branches() -> Self {
        Self::new().args(["config", "remote.origin.fetch", "+refs/heads/*:refs/remotes/origin/*"])
    }

    pub fn checkout_detached(commit: &str) -> Self {
        Self::new().args(["checkout", "--force", "--detach", commit])
    }

    pub fn checkout_local_branch(branch: &str) -> Self {
        Self::new().args(["checkout", "--force", branch])
    }

    /// `checkout -B branch origin/branch`: reset the local branch to the remote tip.
    pub fn checkout_branch(branch: &str, remote_ref: &str) -> Self {
        Self::new().args(["checkout", "--force", "-B", branch, remote_ref])
    }

    pub fn current_commit() -> Self {
        Self::new().args(["rev-parse", "HEAD"])
    }

    /// `rev-parse --verify --quiet <ref>^{commit}`
    pub fn verify_ref(ref_name: &str) -> Self {
        Self::new().args(["rev-parse", "--verify", "--quiet", &format!("{ref_name}^{{commit}}")])
    }

    pub fn remote_url() -> Self {
        Self::new().args(["remote", "get-url", "origin"])
    }

    pub fn version() -> Self {
        Self::new().arg("--version")
    }
}
