use anyhow::Result;
use sha2::{Digest, Sha256};
use std::fs;

use crate::common::TestProject;
use specledger::lockfile::LockFile;
use specledger::manifest::Manifest;

fn sha_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Project with dependency `r` on a repo holding `specs/x.md` = `hello\n`,
/// already resolved.
fn resolved() -> Result<(TestProject, specledger::test_utils::TestGit, String)> {
    let project = TestProject::initialized()?;
    let (remote, commit) = project.create_source_repo("r", &[("specs/x.md", "hello\n")])?;
    project
        .run_sl(&["deps", "add", &remote.file_url(), "--path", "specs/", "--alias", "r"])?
        .assert_success();
    project.run_sl(&["deps", "resolve"])?.assert_success();
    Ok((project, remote, commit))
}

#[test]
fn fresh_resolve_pins_commit_size_and_hash() -> Result<()> {
    let (project, _remote, commit) = resolved()?;

    let lockfile = LockFile::load(&project.lockfile_path())?;
    assert_eq!(lockfile.entries.len(), 1);
    let entry = &lockfile.entries[0];
    assert_eq!(entry.commit_hash, commit);
    assert_eq!(entry.branch, "main");
    assert_eq!(entry.artifact_path, "specs/");
    assert_eq!(entry.size, 6);
    assert_eq!(lockfile.total_size, 6);

    let file_hex = sha_hex(b"x.md\x006\x00hello\n");
    let expected = sha_hex(format!("x.md\0{file_hex}\n").as_bytes());
    assert_eq!(entry.content_hash, expected);

    let raw = project.read_file("specledger/spec.sum")?;
    assert!(raw.ends_with("}\n"));
    let schema_pos = raw.find("\"schema_version\"").unwrap();
    let entries_pos = raw.find("\"entries\"").unwrap();
    let total_pos = raw.find("\"total_size\"").unwrap();
    assert!(schema_pos < entries_pos && entries_pos < total_pos);
    Ok(())
}

#[test]
fn second_resolve_is_byte_identical() -> Result<()> {
    let (project, _remote, _) = resolved()?;
    let first = fs::read(project.lockfile_path())?;

    project.run_sl(&["deps", "resolve"])?.assert_success().assert_stdout_contains("already up to date");
    assert_eq!(fs::read(project.lockfile_path())?, first);
    Ok(())
}

#[test]
fn alias_collision_leaves_manifest_untouched() -> Result<()> {
    let (project, _remote, _) = resolved()?;
    let (other, _) = project.create_source_repo("other", &[("specs/y.md", "y\n")])?;
    let before = fs::read(project.manifest_path())?;

    let output = project.run_sl(&["deps", "add", &other.file_url(), "--path", "specs/", "--alias", "r"])?;
    output.assert_code(1);
    assert!(output.stderr.to_lowercase().contains("alias"), "stderr: {}", output.stderr);
    assert_eq!(fs::read(project.manifest_path())?, before);
    Ok(())
}

#[test]
fn fetch_latest_follows_remote_advance() -> Result<()> {
    let (project, remote, first) = resolved()?;
    let before = LockFile::load(&project.lockfile_path())?;

    remote.write_file("specs/x.md", "world\n")?;
    let second = remote.commit_all("advance")?;

    project.run_sl(&["deps", "resolve"])?.assert_success();
    assert_eq!(LockFile::load(&project.lockfile_path())?.entries[0].commit_hash, first);

    project.run_sl(&["deps", "resolve", "--fetch-latest"])?.assert_success();
    let after = LockFile::load(&project.lockfile_path())?;
    assert_eq!(after.entries[0].commit_hash, second);
    assert_eq!(after.entries[0].size, 6);
    assert_ne!(after.entries[0].content_hash, before.entries[0].content_hash);

    let cached = project.cache_path().join("r").join("repo").join("specs").join("x.md");
    assert_eq!(fs::read_to_string(cached)?, "world\n");
    Ok(())
}

#[test]
fn reference_validation() -> Result<()> {
    let (project, _remote, _) = resolved()?;

    project.write_file("spec.md", "[See](https://example.com/o/r) and spec.r#section\n")?;
    project
        .run_sl(&["refs", "validate", "--strict"])?
        .assert_success()
        .assert_stdout_contains("Found 2 references");

    project.write_file("spec.md", "[See](https://example.com/o/r) and spec.q#section\n")?;
    let output = project.run_sl(&["refs", "validate", "--strict"])?;
    output.assert_code(1);
    assert_eq!(output.stdout.matches('✗').count(), 1);
    assert!(output.stdout.contains("'q'"));

    project.run_sl(&["refs", "validate"])?.assert_success();
    project
        .run_sl(&["refs", "list"])?
        .assert_success()
        .assert_stdout_contains("[inline] spec.q#section")
        .assert_stdout_contains("1:36");
    Ok(())
}

#[test]
fn vendor_copies_then_noops_then_forces() -> Result<()> {
    let (project, _remote, _) = resolved()?;

    project.run_sl(&["vendor", "--output", "vendor/"])?.assert_success();
    let vendored = project.project_path().join("vendor").join("r").join("x.md");
    assert_eq!(fs::read_to_string(&vendored)?, "hello\n");

    project.run_sl(&["vendor", "--output", "vendor/"])?.assert_success().assert_stdout_contains("already up to date");

    project
        .run_sl(&["vendor", "--output", "vendor/", "--force"])?
        .assert_success()
        .assert_stdout_contains("1 written");
    assert_eq!(fs::read_to_string(&vendored)?, "hello\n");
    Ok(())
}

#[test]
fn vendor_clean_removes_output_dir() -> Result<()> {
    let (project, _remote, _) = resolved()?;

    project.run_sl(&["vendor", "--output", "vendor/"])?.assert_success();
    assert!(project.project_path().join("vendor").join("r").join("x.md").exists());
    project
        .run_sl(&["vendor", "clean", "--output", "vendor/"])?
        .assert_success()
        .assert_stdout_contains("Removed");
    assert!(!project.project_path().join("vendor").exists());
    project
        .run_sl(&["vendor", "clean", "--output", "vendor/"])?
        .assert_success()
        .assert_stdout_contains("Nothing to remove");

    // Default location sits next to the manifest
    project.run_sl(&["vendor"])?.assert_success();
    let default_dir = project.project_path().join("specledger").join("vendor");
    assert!(default_dir.join("r").join("x.md").exists());
    project.run_sl(&["vendor", "clean"])?.assert_success();
    assert!(!default_dir.exists());
    assert!(project.project_path().join("specledger").join("spec.sum").exists());
    Ok(())
}

#[test]
fn manifest_round_trips_byte_identical() -> Result<()> {
    let (project, _remote, _) = resolved()?;
    let raw = project.read_file("specledger/spec.mod")?;
    let manifest = Manifest::from_yaml_str(&raw)?;
    assert_eq!(manifest.to_yaml_string()?, raw);
    Ok(())
}
