use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;

use crate::common::TestProject;

fn sl(project: &TestProject) -> Result<Command> {
    let mut cmd = Command::cargo_bin("sl")?;
    cmd.current_dir(project.project_path())
        .env("SPECLEDGER_CACHE_DIR", project.cache_path())
        .env("SPECLEDGER_NO_PROGRESS", "1")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    Ok(cmd)
}

#[test]
fn missing_manifest_exits_with_two() -> Result<()> {
    let project = TestProject::new()?;
    sl(&project)?
        .args(["deps", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Not a SpecLedger project"))
        .stderr(predicate::str::contains("sl init"));
    Ok(())
}

#[test]
fn missing_explicit_manifest_exits_with_two() -> Result<()> {
    let project = TestProject::initialized()?;
    let missing = project.project_path().join("nowhere").join("spec.mod");
    sl(&project)?
        .args(["--manifest-path", &missing.to_string_lossy(), "deps", "list"])
        .assert()
        .code(2);
    Ok(())
}

#[test]
fn manifest_found_from_subdirectory() -> Result<()> {
    let project = TestProject::initialized()?;
    project.write_file("docs/notes.md", "notes\n")?;
    let mut cmd = sl(&project)?;
    cmd.current_dir(project.project_path().join("docs"))
        .args(["deps", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No dependencies declared"));
    Ok(())
}

#[test]
fn init_twice_fails() -> Result<()> {
    let project = TestProject::initialized()?;
    sl(&project)?
        .args(["init"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
    Ok(())
}

#[test]
fn malformed_manifest_is_reported() -> Result<()> {
    let project = TestProject::initialized()?;
    project.write_file("specledger/spec.mod", "version: [unterminated\n")?;
    sl(&project)?
        .args(["deps", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("spec.mod"));
    Ok(())
}

#[test]
fn validate_without_lockfile_fails() -> Result<()> {
    let project = TestProject::initialized()?;
    project.write_file("spec.md", "plain text\n")?;
    sl(&project)?
        .args(["refs", "validate"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("sl deps resolve"));
    Ok(())
}

#[test]
fn unreachable_repository_fails_without_lockfile() -> Result<()> {
    let project = TestProject::initialized()?;
    let missing = project.project_path().join("no-such-repo");
    project
        .run_sl(&["deps", "add", &format!("file://{}", missing.display()), "--alias", "gone"])?
        .assert_success();

    sl(&project)?.args(["deps", "resolve"]).assert().code(1);
    assert!(!project.lockfile_path().exists());
    Ok(())
}

#[test]
fn verbose_and_quiet_conflict() -> Result<()> {
    let project = TestProject::new()?;
    sl(&project)?.args(["-v", "-q", "cache", "info"]).assert().failure();
    Ok(())
}
