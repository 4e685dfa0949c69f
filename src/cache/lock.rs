//! Advisory file locks for cache entries and project directories.
//!
//! A [`FileLock`] holds an exclusive OS lock (via [`fs4`]) on a lock file for
//! as long as the value lives. Dropping it releases the lock on every exit
//! path, including errors and cancellation.
//!
//! All blocking file operations run on `spawn_blocking` so a contended lock
//! never stalls a tokio worker. Acquisition polls `try_lock_exclusive` until
//! the timeout; when the lock file has not been touched for longer than the
//! stale threshold, the file is replaced and the old holder is abandoned.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

use crate::constants::LOCK_POLL_INTERVAL;
use crate::core::SpecLedgerError;

/// Exclusive lock on a file, released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: Arc<File>,
    path: PathBuf,
}

impl FileLock {
    /// Acquire the lock at `path`, creating the file and its parent directory.
    ///
    /// Waits up to `timeout`. With `stale_after` set, a lock file older than
    /// that is broken with a warning.
    ///
    /// # Errors
    ///
    /// [`SpecLedgerError::LockTimeout`] when the lock stays held, or an IO
    /// error when the lock file cannot be created.
    pub async fn acquire(
        path: &Path,
        timeout: Duration,
        stale_after: Option<Duration>,
    ) -> Result<Self> {
        let start = Instant::now();
        let mut file = open_lock_file(path).await?;

        loop {
            let candidate = Arc::clone(&file);
            let locked = tokio::task::spawn_blocking(move || candidate.try_lock_exclusive())
                .await
                .context("spawn_blocking panicked")?;

            if matches!(locked, Ok(true)) && !path.exists() {
                // Removed (pruned or broken as stale) while we waited: the lock
                // we hold is on an unlinked file, so start over on a fresh one.
                debug!(target: "cache", lock = %path.display(), "Lock file vanished, reopening");
                if let Err(e) = FileExt::unlock(&*file) {
                    debug!(target: "cache", "Failed to unlock {}: {}", path.display(), e);
                }
                file = open_lock_file(path).await?;
                continue;
            }

            if matches!(locked, Ok(true)) {
                let stamped = Arc::clone(&file);
                tokio::task::spawn_blocking(move || stamp(&stamped))
                    .await
                    .context("spawn_blocking panicked")?
                    .with_context(|| format!("Failed to write lock file {}", path.display()))?;
                debug!(
                    target: "cache",
                    lock = %path.display(),
                    wait_ms = start.elapsed().as_millis(),
                    "Lock acquired"
                );
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }

            let stale = stale_after
                .filter(|threshold| lock_age(path).is_some_and(|age| age > *threshold));
            if let Some(threshold) = stale {
                warn!(
                    target: "cache",
                    "Breaking stale lock {} (older than {} minutes)",
                    path.display(),
                    threshold.as_secs() / 60
                );
                match tokio::fs::remove_file(path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!("Failed to remove stale lock {}", path.display())
                        });
                    }
                }
                file = open_lock_file(path).await?;
                continue;
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Err(SpecLedgerError::LockTimeout {
                    path: path.display().to_string(),
                    seconds: timeout.as_secs(),
                }
                .into());
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL.min(remaining)).await;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&*self.file) {
            debug!(target: "cache", "Failed to unlock {}: {}", self.path.display(), e);
        }
        debug!(target: "cache", lock = %self.path.display(), "Lock released");
    }
}

async fn open_lock_file(path: &Path) -> Result<Arc<File>> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create lock directory {}", parent.display()))?;
    }
    let owned = path.to_path_buf();
    let file = tokio::task::spawn_blocking(move || {
        OpenOptions::new().create(true).write(true).truncate(false).open(&owned)
    })
    .await
    .context("spawn_blocking panicked")?
    .with_context(|| format!("Failed to open lock file {}", path.display()))?;
    Ok(Arc::new(file))
}

/// Record the holder's pid and acquisition time; this also refreshes mtime.
fn stamp(file: &File) -> std::io::Result<()> {
    file.set_len(0)?;
    let mut writer = file;
    writeln!(writer, "{} {}", std::process::id(), chrono::Utc::now().to_rfc3339())?;
    writer.flush()
}

fn lock_age(path: &Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    SystemTime::now().duration_since(modified).ok()
}
