//! Single-writer lock on a project's manifest and lockfile.
//!
//! `resolve`, `update` and `vendor` hold `<artifact_path>/.spec.lock` for
//! their whole run so two invocations in the same project cannot interleave
//! lockfile writes. Readers (`deps list`, `refs validate`) never take it.

use anyhow::Result;
use std::path::Path;
use tracing::debug;

use crate::cache::FileLock;
use crate::constants::{DEFAULT_LOCK_TIMEOUT, PROJECT_LOCK_FILE};

/// Held for the duration of a project-mutating command.
#[derive(Debug)]
pub struct ProjectLock {
    _lock: FileLock,
}

impl ProjectLock {
    /// Acquire the lock in `artifact_dir`, waiting up to the default timeout.
    pub async fn acquire(artifact_dir: &Path) -> Result<Self> {
        let path = artifact_dir.join(PROJECT_LOCK_FILE);
        debug!(target: "resolver", "Waiting for project lock {}", path.display());
        let lock = FileLock::acquire(&path, DEFAULT_LOCK_TIMEOUT, None).await?;
        Ok(Self {
            _lock: lock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SpecLedgerError, find_error};
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_project_lock_excludes_second_writer() {
        let temp = TempDir::new().unwrap();
        let _held = ProjectLock::acquire(temp.path()).await.unwrap();
        assert!(temp.path().join(PROJECT_LOCK_FILE).exists());

        let err = FileLock::acquire(&temp.path().join(PROJECT_LOCK_FILE), Duration::from_millis(100), None)
            .await
            .unwrap_err();
        assert!(matches!(find_error(&err), Some(SpecLedgerError::LockTimeout { .. })));
    }
}
