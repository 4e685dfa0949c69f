//! Content hashing of artifact trees.

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::fs;
use tempfile::TempDir;

use specledger::hashing::{artifact_files, composite_hash, content_hash};

fn sha_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[test]
fn digest_is_independent_of_location() -> Result<()> {
    let a = TempDir::new()?;
    let b = TempDir::new()?;
    for root in [a.path(), b.path()] {
        fs::create_dir_all(root.join("nested"))?;
        fs::write(root.join("top.md"), "top\n")?;
        fs::write(root.join("nested").join("deep.md"), "deep\n")?;
    }

    let left = content_hash(a.path())?;
    let right = content_hash(b.path())?;
    assert_eq!(left, right);
    assert_eq!(left.file_count, 2);
    assert_eq!(left.size, 9);
    Ok(())
}

#[test]
fn single_file_uses_its_name() -> Result<()> {
    let temp = TempDir::new()?;
    let file = temp.path().join("x.md");
    fs::write(&file, "hello\n")?;

    let digest = content_hash(&file)?;
    let file_hex = sha_hex(b"x.md\x006\x00hello\n");
    assert_eq!(digest.content_hash, sha_hex(format!("x.md\0{file_hex}\n").as_bytes()));
    assert_eq!(digest.size, 6);
    Ok(())
}

#[test]
fn vcs_directories_are_ignored() -> Result<()> {
    let temp = TempDir::new()?;
    fs::write(temp.path().join("a.md"), "a\n")?;
    let before = content_hash(temp.path())?;

    fs::create_dir_all(temp.path().join(".git"))?;
    fs::write(temp.path().join(".git").join("HEAD"), "ref: refs/heads/main\n")?;
    assert_eq!(content_hash(temp.path())?, before);

    let files = artifact_files(temp.path())?;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].0, "a.md");
    Ok(())
}

#[test]
fn files_are_ordered_bytewise() -> Result<()> {
    let temp = TempDir::new()?;
    for name in ["b.md", "B.md", "a.md"] {
        fs::write(temp.path().join(name), name)?;
    }
    let names: Vec<String> = artifact_files(temp.path())?.into_iter().map(|(rel, _)| rel).collect();
    assert_eq!(names, ["B.md", "a.md", "b.md"]);
    Ok(())
}

#[test]
fn empty_directory_hashes_to_empty_digest() -> Result<()> {
    let temp = TempDir::new()?;
    let digest = content_hash(temp.path())?;
    assert_eq!(digest.content_hash, sha_hex(b""));
    assert_eq!(digest.size, 0);
    Ok(())
}

#[test]
fn composite_depends_on_order() {
    let first = ("https://h/o/a", "specs/", "1111", "aaaa");
    let second = ("https://h/o/b", "specs/", "2222", "bbbb");
    assert_ne!(composite_hash([first, second]), composite_hash([second, first]));
    assert_eq!(composite_hash([first, second]), composite_hash([first, second]));
}
