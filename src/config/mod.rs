//! Runtime configuration
//!
//! Settings are layered, highest precedence first:
//!
//! 1. explicit overrides from the command line ([`SettingsOverrides`])
//! 2. environment: `SPECLEDGER_CACHE_DIR`, `SPECLEDGER_MAX_PARALLEL`
//! 3. the global [`GlobalConfig`] file
//! 4. built-in defaults from [`crate::constants`]
//!
//! Credentials are never stored here. The only transport-related setting is
//! an optional SSH key path that is tried before the default probe list.

mod global;

pub use global::GlobalConfig;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{DEFAULT_LOCK_TIMEOUT, DEFAULT_MAX_PARALLEL, DEFAULT_STALE_LOCK_AGE};

/// Cache root: `$SPECLEDGER_CACHE_DIR`, else `$HOME/.specledger/cache`.
///
/// The directory is not created here; the cache store creates it lazily.
pub fn get_cache_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("SPECLEDGER_CACHE_DIR")
        && !dir.is_empty()
    {
        return Ok(expand_path(&dir));
    }

    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
        .join(".specledger")
        .join("cache"))
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub cache_dir: Option<PathBuf>,
    pub max_parallel: Option<usize>,
    pub config_path: Option<PathBuf>,
}

/// Effective settings after merging every layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub cache_dir: PathBuf,
    pub max_parallel: usize,
    pub stale_lock_age: Duration,
    pub lock_timeout: Duration,
    pub ssh_key: Option<PathBuf>,
}

impl Settings {
    pub async fn load(overrides: &SettingsOverrides) -> Result<Self> {
        let global = GlobalConfig::load_with_optional(overrides.config_path.clone())
            .await
            .context("Failed to load global configuration")?;
        Self::merge(overrides, &global)
    }

    /// Merge layers without touching the filesystem.
    pub fn merge(overrides: &SettingsOverrides, global: &GlobalConfig) -> Result<Self> {
        let cache_dir = if let Some(dir) = &overrides.cache_dir {
            dir.clone()
        } else if std::env::var_os("SPECLEDGER_CACHE_DIR").is_some_and(|v| !v.is_empty()) {
            get_cache_dir()?
        } else if let Some(dir) = &global.cache_dir {
            expand_path(dir)
        } else {
            get_cache_dir()?
        };

        let env_parallel = match std::env::var("SPECLEDGER_MAX_PARALLEL") {
            Ok(raw) => Some(raw.trim().parse::<usize>().with_context(|| {
                format!("SPECLEDGER_MAX_PARALLEL must be a positive integer, got '{raw}'")
            })?),
            Err(_) => None,
        };
        let max_parallel = overrides
            .max_parallel
            .or(env_parallel)
            .or(global.max_parallel)
            .unwrap_or(DEFAULT_MAX_PARALLEL)
            .max(1);

        let stale_lock_age = global
            .lock_stale_minutes
            .map_or(DEFAULT_STALE_LOCK_AGE, |m| Duration::from_secs(m * 60));
        let lock_timeout =
            global.lock_timeout_seconds.map_or(DEFAULT_LOCK_TIMEOUT, Duration::from_secs);

        Ok(Self {
            cache_dir,
            max_parallel,
            stale_lock_age,
            lock_timeout,
            ssh_key: global.ssh_key.as_deref().map(expand_path),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}
