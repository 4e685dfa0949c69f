//! Copy locked artifacts into the project for offline builds.
//!
//! For every manifest dependency the cache entry is checked out at the
//! lockfile's commit, its artifact tree is re-hashed against the lockfile,
//! and the files are mirrored into `<output>/<alias>/`. Files already holding
//! the same bytes are left alone unless `force` is set; files that no longer
//! exist upstream are deleted.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::cache::{Cache, CheckoutTarget};
use crate::core::{CancellationToken, SpecLedgerError, ensure_not_cancelled};
use crate::hashing::{artifact_files, content_hash_async};
use crate::lockfile::LockFile;
use crate::manifest::Project;
use crate::utils::{ProjectLock, copy_file_if_changed, remove_dir_if_exists, remove_empty_dirs, to_slash_path};

/// Counters for one vendor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VendorStats {
    pub dependencies: usize,
    pub written: usize,
    pub skipped: usize,
    pub removed: usize,
}

/// Mirror every locked dependency into `output/<alias>/`.
///
/// # Errors
///
/// - [`SpecLedgerError::NotFound`] when a dependency has no lockfile entry
/// - [`SpecLedgerError::ChecksumMismatch`] when the cached tree at the locked
///   commit no longer hashes to the locked content hash
pub async fn vendor(
    project: &Project,
    cache: &Cache,
    output: &Path,
    force: bool,
    cancel: &CancellationToken,
) -> Result<VendorStats> {
    let _lock = ProjectLock::acquire(&project.artifact_dir()).await?;
    let lockfile = LockFile::load(&project.lockfile_path())?;

    let mut stats = VendorStats::default();
    for dep in &project.manifest.dependencies {
        ensure_not_cancelled(cancel, "vendor")?;
        let alias = dep.alias_or_empty();
        let Some(entry) = lockfile.entry_for(dep) else {
            return Err(SpecLedgerError::NotFound {
                what: format!("lockfile entry for '{alias}' (run `sl deps resolve`)"),
            }
            .into());
        };

        let cached = cache
            .ensure(dep, CheckoutTarget::Pinned(&entry.commit_hash), false, cancel)
            .await
            .with_context(|| format!("Failed to check out '{alias}' at {}", entry.commit_hash))?;
        let root = cached.worktree.join(&dep.artifact_path);

        let digest = content_hash_async(root.clone()).await?;
        if digest.content_hash != entry.content_hash {
            return Err(SpecLedgerError::ChecksumMismatch {
                name: alias.to_string(),
                expected: entry.content_hash.clone(),
                actual: digest.content_hash,
            }
            .into());
        }

        let dest = output.join(alias);
        let (written, skipped, removed) =
            tokio::task::spawn_blocking(move || mirror(&root, &dest, force))
                .await
                .context("spawn_blocking panicked")??;
        drop(cached);
        debug!(
            target: "resolver",
            "Vendored '{}': {} written, {} unchanged, {} removed",
            alias, written, skipped, removed
        );

        stats.dependencies += 1;
        stats.written += written;
        stats.skipped += skipped;
        stats.removed += removed;
    }

    info!(
        target: "resolver",
        "Vendored {} dependencies into {} ({} files written)",
        stats.dependencies,
        output.display(),
        stats.written
    );
    Ok(stats)
}

/// Remove a vendor output directory. Returns whether it existed.
pub async fn clean_vendor(project: &Project, output: &Path) -> Result<bool> {
    let _lock = ProjectLock::acquire(&project.artifact_dir()).await?;
    let existed = output.exists();
    remove_dir_if_exists(output)?;
    if existed {
        info!(target: "resolver", "Removed vendor directory {}", output.display());
    }
    Ok(existed)
}

/// Make `dest` contain exactly the artifact files of `root`.
fn mirror(root: &Path, dest: &Path, force: bool) -> Result<(usize, usize, usize)> {
    let files = artifact_files(root)?;
    let mut wanted = HashSet::with_capacity(files.len());
    let (mut written, mut skipped) = (0, 0);

    for (rel, src) in &files {
        let target: PathBuf = dest.join(rel);
        if copy_file_if_changed(src, &target, force)? {
            written += 1;
        } else {
            skipped += 1;
        }
        wanted.insert(rel.clone());
    }

    let mut removed = 0;
    if dest.is_dir() {
        for entry in WalkDir::new(dest).min_depth(1) {
            let entry = entry.with_context(|| format!("Failed to walk {}", dest.display()))?;
            if entry.file_type().is_dir() {
                continue;
            }
            let rel = to_slash_path(entry.path().strip_prefix(dest).unwrap_or(entry.path()));
            if !wanted.contains(&rel) {
                std::fs::remove_file(entry.path())
                    .map_err(SpecLedgerError::IoError)
                    .with_context(|| format!("Failed to remove {}", entry.path().display()))?;
                removed += 1;
            }
        }
        remove_empty_dirs(dest)?;
    }

    Ok((written, skipped, removed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MANIFEST_FILE;
    use crate::core::find_error;
    use crate::git::GitTransport;
    use crate::manifest::{Manifest, NewDependency};
    use crate::resolver::{ResolveOptions, Resolver};
    use crate::test_utils::fixture_repo;
    use tempfile::TempDir;

    async fn resolved_project(temp: &TempDir, url: &str) -> (Project, Resolver) {
        let path = temp.path().join("project").join("specledger").join(MANIFEST_FILE);
        let mut manifest = Manifest::new("demo", "DM");
        manifest
            .add_dependency(
                NewDependency {
                    repository_url: url.to_string(),
                    artifact_path: Some("specs/".to_string()),
                    alias: Some("r".to_string()),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        manifest.save(&path).unwrap();
        let project = Project::load(&path).unwrap();

        let cache = Cache::new(temp.path().join("cache"))
            .with_transport(GitTransport::new().with_ssh_dir(None));
        let resolver = Resolver::new(cache);
        resolver
            .resolve(&project, &ResolveOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        (project, resolver)
    }

    #[tokio::test]
    async fn test_vendor_copies_then_noops_then_forces() {
        let temp = TempDir::new().unwrap();
        let (remote, _) = fixture_repo(&temp.path().join("remote"), &[("specs/x.md", "hello\n")]).unwrap();
        let (project, resolver) = resolved_project(&temp, &remote.file_url()).await;
        let output = project.root.join("vendor");
        let cancel = CancellationToken::new();

        let first = vendor(&project, resolver.cache(), &output, false, &cancel).await.unwrap();
        assert_eq!(first.written, 1);
        assert_eq!(std::fs::read_to_string(output.join("r").join("x.md")).unwrap(), "hello\n");

        let second = vendor(&project, resolver.cache(), &output, false, &cancel).await.unwrap();
        assert_eq!(second.written, 0);
        assert_eq!(second.skipped, 1);

        let forced = vendor(&project, resolver.cache(), &output, true, &cancel).await.unwrap();
        assert_eq!(forced.written, 1);
    }

    #[tokio::test]
    async fn test_vendor_removes_files_deleted_upstream() {
        let temp = TempDir::new().unwrap();
        let (remote, _) = fixture_repo(
            &temp.path().join("remote"),
            &[("specs/x.md", "hello\n"), ("specs/old/y.md", "bye\n")],
        )
        .unwrap();
        let (project, resolver) = resolved_project(&temp, &remote.file_url()).await;
        let output = project.root.join("vendor");
        let cancel = CancellationToken::new();
        vendor(&project, resolver.cache(), &output, false, &cancel).await.unwrap();
        assert!(output.join("r/old/y.md").exists());

        std::fs::remove_dir_all(remote.repo_path().join("specs/old")).unwrap();
        remote.commit_all("drop old").unwrap();
        resolver.update(&project, None, false, 1, &cancel).await.unwrap();

        let stats = vendor(&project, resolver.cache(), &output, false, &cancel).await.unwrap();
        assert_eq!(stats.removed, 1);
        assert!(!output.join("r/old").exists());
        assert!(output.join("r/x.md").exists());
    }

    #[tokio::test]
    async fn test_clean_vendor_removes_output() {
        let temp = TempDir::new().unwrap();
        let (remote, _) = fixture_repo(&temp.path().join("remote"), &[("specs/x.md", "hello\n")]).unwrap();
        let (project, resolver) = resolved_project(&temp, &remote.file_url()).await;
        let output = project.root.join("vendor");
        vendor(&project, resolver.cache(), &output, false, &CancellationToken::new()).await.unwrap();

        assert!(clean_vendor(&project, &output).await.unwrap());
        assert!(!output.exists());
        assert!(!clean_vendor(&project, &output).await.unwrap());
        assert!(project.lockfile_path().exists());
    }

    #[tokio::test]
    async fn test_vendor_requires_lockfile_entry() {
        let temp = TempDir::new().unwrap();
        let (remote, _) = fixture_repo(&temp.path().join("remote"), &[("specs/x.md", "hello\n")]).unwrap();
        let (project, resolver) = resolved_project(&temp, &remote.file_url()).await;
        std::fs::remove_file(project.lockfile_path()).unwrap();

        let err = vendor(&project, resolver.cache(), &temp.path().join("out"), false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(find_error(&err), Some(SpecLedgerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_vendor_detects_checksum_mismatch() {
        let temp = TempDir::new().unwrap();
        let (remote, _) = fixture_repo(&temp.path().join("remote"), &[("specs/x.md", "hello\n")]).unwrap();
        let (project, resolver) = resolved_project(&temp, &remote.file_url()).await;

        let mut lockfile = LockFile::load(&project.lockfile_path()).unwrap();
        lockfile.entries[0].content_hash = "0".repeat(64);
        lockfile.save(&project.lockfile_path()).unwrap();

        let err = vendor(&project, resolver.cache(), &temp.path().join("out"), false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(find_error(&err), Some(SpecLedgerError::ChecksumMismatch { .. })));
    }
}
