//! Canonical content hashing for dependency artifact trees
//!
//! The hash of a tree is independent of filesystem enumeration order, file
//! modification times and platform path separators:
//!
//! 1. every regular file below the root is collected, skipping VCS metadata
//!    directories (`.git`, `.hg`, `.svn`);
//! 2. paths are made relative to the root, joined with `/` and NFC-normalized,
//!    then sorted by their UTF-8 bytes;
//! 3. each file digest is `sha256(relpath \0 size \0 contents)` where `size` is
//!    the decimal byte count;
//! 4. the tree digest is `sha256` over `relpath \0 file_hex \n` for every file in
//!    sorted order, rendered as lowercase hex.
//!
//! Symlinks and special files are rejected. If the root is itself a regular
//! file, the tree consists of that one file, keyed by its file name.
//!
//! The result never equals Git's own tree SHA and must not be substituted by it.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;
use walkdir::WalkDir;

use crate::core::SpecLedgerError;
use crate::utils::to_slash_path;

const VCS_DIRS: [&str; 3] = [".git", ".hg", ".svn"];

/// Result of hashing an artifact tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    /// 64-char lowercase hex tree digest
    pub content_hash: String,
    /// Sum of all hashed file sizes in bytes
    pub size: u64,
    /// Number of files included
    pub file_count: usize,
}

struct HashedFile {
    rel: String,
    path: PathBuf,
    size: u64,
}

/// Hash the artifact tree rooted at `root` (a directory or a single file).
pub fn content_hash(root: &Path) -> Result<ContentDigest> {
    let files = gather(root)?;

    let mut tree = Sha256::new();
    let mut size = 0u64;
    for file in &files {
        let file_hex = hash_file(file)?;
        tree.update(file.rel.as_bytes());
        tree.update(b"\0");
        tree.update(file_hex.as_bytes());
        tree.update(b"\n");
        size += file.size;
    }

    tracing::trace!(target: "hashing", "Hashed {} files ({} bytes) under {}", files.len(), size, root.display());

    Ok(ContentDigest {
        content_hash: hex::encode(tree.finalize()),
        size,
        file_count: files.len(),
    })
}

/// [`content_hash`] on the blocking pool.
pub async fn content_hash_async(root: PathBuf) -> Result<ContentDigest> {
    tokio::task::spawn_blocking(move || content_hash(&root))
        .await
        .context("Hashing task panicked")?
}

/// Digest a whole dependency set: `sha256` over
/// `repository_url \0 artifact_path \0 commit_hash \0 content_hash \n` per entry,
/// in the order given.
#[must_use]
pub fn composite_hash<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str, &'a str, &'a str)>,
{
    let mut hasher = Sha256::new();
    for (url, artifact_path, commit, content) in entries {
        for part in [url, artifact_path, commit] {
            hasher.update(part.as_bytes());
            hasher.update(b"\0");
        }
        hasher.update(content.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Files of the artifact tree at `root` as `(relative path, absolute path)`,
/// in hashing order. Vendoring copies exactly this set.
pub fn artifact_files(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    Ok(gather(root)?.into_iter().map(|f| (f.rel, f.path)).collect())
}

fn gather(root: &Path) -> Result<Vec<HashedFile>> {
    let meta = fs::symlink_metadata(root).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::Error::from(SpecLedgerError::NotFound {
                what: format!("artifact path {}", root.display()),
            })
        } else {
            anyhow::Error::from(e).context(format!("Failed to stat {}", root.display()))
        }
    })?;

    let mut files = if meta.file_type().is_symlink() {
        return Err(reject(root, "symlinks are not allowed in artifact trees"));
    } else if meta.is_file() {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().nfc().collect::<String>())
            .unwrap_or_default();
        vec![HashedFile {
            rel: name,
            path: root.to_path_buf(),
            size: meta.len(),
        }]
    } else {
        collect_files(root)?
    };

    files.sort_by(|a, b| a.rel.as_bytes().cmp(b.rel.as_bytes()));
    Ok(files)
}

fn collect_files(root: &Path) -> Result<Vec<HashedFile>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|e| {
        !(e.file_type().is_dir() && e.file_name().to_str().is_some_and(|n| VCS_DIRS.contains(&n)))
    });

    for entry in walker {
        let entry = entry
            .with_context(|| format!("Failed to read directory entry in: {}", root.display()))?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            continue;
        }
        if file_type.is_symlink() {
            return Err(reject(entry.path(), "symlinks are not allowed in artifact trees"));
        }
        if !file_type.is_file() {
            return Err(reject(entry.path(), "only regular files are allowed in artifact trees"));
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let rel: String = to_slash_path(relative).nfc().collect();
        let size = entry
            .metadata()
            .with_context(|| format!("Failed to read metadata: {}", entry.path().display()))?
            .len();

        files.push(HashedFile {
            rel,
            path: entry.into_path(),
            size,
        });
    }

    Ok(files)
}

fn hash_file(file: &HashedFile) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(file.rel.as_bytes());
    hasher.update(b"\0");
    hasher.update(file.size.to_string().as_bytes());
    hasher.update(b"\0");

    let mut handle = fs::File::open(&file.path)
        .with_context(|| format!("Cannot read file for hashing: {}", file.path.display()))?;
    let copied = std::io::copy(&mut handle, &mut hasher)
        .with_context(|| format!("Cannot read file for hashing: {}", file.path.display()))?;
    if copied != file.size {
        anyhow::bail!("File changed while hashing: {}", file.path.display());
    }

    Ok(hex::encode(hasher.finalize()))
}

fn reject(path: &Path, reason: &str) -> anyhow::Error {
    SpecLedgerError::InvalidArtifactPath {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
    .into()
}
