//! Filesystem primitives shared by the cache, lockfile and vendor code.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Component, Path};

use crate::core::SpecLedgerError;

/// Create `path` and all parents if missing.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .map_err(SpecLedgerError::IoError)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(SpecLedgerError::FileSystemError {
            operation: "create directory".to_string(),
            path: path.display().to_string(),
        }
        .into());
    }
    Ok(())
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Write `content` to `path` atomically.
///
/// The bytes go to a temporary file in the same directory which is synced
/// and then renamed over `path`, so readers see either the old or the new
/// file and never a partial one.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    ensure_parent_dir(path)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .map_err(SpecLedgerError::IoError)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    temp.write_all(content)
        .map_err(SpecLedgerError::IoError)
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    temp.as_file().sync_all().map_err(SpecLedgerError::IoError).context("Failed to sync file to disk")?;
    temp.persist(path)
        .map_err(|e| SpecLedgerError::IoError(e.error))
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Remove a directory tree, ignoring a missing path.
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SpecLedgerError::IoError(e))
            .with_context(|| format!("Failed to remove directory: {}", path.display())),
    }
}

/// Copy `src` to `dst` unless `dst` already holds the same bytes.
///
/// Returns `true` when the file was written. With `force` the copy always
/// happens.
pub fn copy_file_if_changed(src: &Path, dst: &Path, force: bool) -> Result<bool> {
    if !force && dst.is_file() {
        let same_len = match (fs::metadata(src), fs::metadata(dst)) {
            (Ok(a), Ok(b)) => a.len() == b.len(),
            _ => false,
        };
        if same_len {
            let existing = fs::read(dst)
                .map_err(SpecLedgerError::IoError)
                .with_context(|| format!("Failed to read {}", dst.display()))?;
            let incoming = fs::read(src)
                .map_err(SpecLedgerError::IoError)
                .with_context(|| format!("Failed to read {}", src.display()))?;
            if existing == incoming {
                return Ok(false);
            }
        }
    }

    ensure_parent_dir(dst)?;
    fs::copy(src, dst).map_err(SpecLedgerError::IoError).with_context(|| {
        format!("Failed to copy file from {} to {}", src.display(), dst.display())
    })?;
    Ok(true)
}

/// Remove empty directories below `root` (not `root` itself), deepest first.
pub fn remove_empty_dirs(root: &Path) -> Result<()> {
    if !root.is_dir() {
        return Ok(());
    }
    for entry in walkdir::WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if entry.file_type().is_dir()
            && fs::read_dir(entry.path()).is_ok_and(|mut it| it.next().is_none())
        {
            fs::remove_dir(entry.path())
                .map_err(SpecLedgerError::IoError)
                .with_context(|| format!("Failed to remove directory: {}", entry.path().display()))?;
        }
    }
    Ok(())
}

/// Render a relative path with `/` separators regardless of platform.
#[must_use]
pub fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
