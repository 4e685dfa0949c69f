//! Shared plumbing for CLI commands

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::cache::Cache;
use crate::config::{Settings, SettingsOverrides};
use crate::core::CancellationToken;
use crate::lockfile::LockFile;
use crate::manifest::{Project, find_manifest};
use crate::resolver::Resolver;
use crate::utils::ProgressBar;

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub manifest_path: Option<PathBuf>,
    pub overrides: SettingsOverrides,
    pub no_progress: bool,
}

impl GlobalOptions {
    pub async fn settings(&self) -> Result<Settings> {
        Settings::load(&self.overrides).await
    }

    pub fn spinner(&self, message: impl Into<String>) -> ProgressBar {
        let bar = if self.no_progress {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        bar.set_message(message);
        bar
    }
}

/// Loaded project plus effective settings.
#[derive(Debug)]
pub struct CommandContext {
    pub project: Project,
    pub settings: Settings,
}

impl CommandContext {
    /// Find and load the project from `--manifest-path` or the current
    /// directory upwards.
    ///
    /// # Errors
    ///
    /// [`crate::core::SpecLedgerError::NotAProject`] when no manifest exists.
    pub async fn load(options: &GlobalOptions) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let manifest_path = find_manifest(options.manifest_path.as_deref(), &cwd)?;
        let project = Project::load(&manifest_path)?;
        let settings = options.settings().await?;
        Ok(Self {
            project,
            settings,
        })
    }

    pub fn cache(&self) -> Cache {
        Cache::from_settings(&self.settings)
    }

    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.cache())
    }

    pub fn load_lockfile(&self) -> Result<LockFile> {
        let path = self.project.lockfile_path();
        LockFile::load(&path).with_context(|| format!("Failed to load lockfile: {}", path.display()))
    }
}

/// Token cancelled on Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping");
            child.cancel();
        }
    });
    token
}

/// First eight characters of a commit.
pub fn short_commit(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}

/// `1536` → `1.5 KiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
