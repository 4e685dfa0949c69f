use anyhow::Result;

use crate::common::{TestGit, TestProject};
use specledger::lockfile::LockFile;
use specledger::manifest::Manifest;

/// Project depending on two repos, `r` and `s`, both resolved.
fn two_deps() -> Result<(TestProject, TestGit, TestGit)> {
    let project = TestProject::initialized()?;
    let (r, _) = project.create_source_repo("r", &[("specs/x.md", "hello\n")])?;
    let (s, _) = project.create_source_repo("s", &[("specledger/api.md", "# API\n")])?;
    project
        .run_sl(&["deps", "add", &r.file_url(), "--path", "specs/", "--alias", "r"])?
        .assert_success();
    project.run_sl(&["deps", "add", &s.file_url(), "--alias", "s"])?.assert_success();
    project.run_sl(&["deps", "resolve"])?.assert_success();
    Ok((project, r, s))
}

fn commit_of(project: &TestProject, alias: &str) -> Result<String> {
    let manifest = Manifest::load(&project.manifest_path())?;
    let lockfile = LockFile::load(&project.lockfile_path())?;
    let locked = lockfile.by_alias(&manifest);
    Ok(locked.get(alias).map(|(_, entry)| entry.commit_hash.clone()).unwrap_or_default())
}

#[test]
fn add_uses_defaults() -> Result<()> {
    let project = TestProject::initialized()?;
    let (repo, _) = project.create_source_repo("payments-api", &[("specledger/a.md", "a\n")])?;

    project
        .run_sl(&["deps", "add", &repo.file_url()])?
        .assert_success()
        .assert_stdout_contains("payments-api");

    let manifest = Manifest::load(&project.manifest_path())?;
    let dep = &manifest.dependencies[0];
    assert_eq!(dep.version, "main");
    assert_eq!(dep.artifact_path, "specledger/");
    assert_eq!(dep.alias.as_deref(), Some("payments-api"));
    Ok(())
}

#[test]
fn add_rejects_escaping_path() -> Result<()> {
    let project = TestProject::initialized()?;
    let (repo, _) = project.create_source_repo("r", &[("a.md", "a\n")])?;
    let before = project.read_file("specledger/spec.mod")?;

    project
        .run_sl(&["deps", "add", &repo.file_url(), "--path", "../outside"])?
        .assert_code(1)
        .assert_stderr_contains("Invalid artifact path");
    assert_eq!(project.read_file("specledger/spec.mod")?, before);
    Ok(())
}

#[test]
fn add_rejects_malformed_url() -> Result<()> {
    let project = TestProject::initialized()?;
    project
        .run_sl(&["deps", "add", "not a url"])?
        .assert_code(1)
        .assert_stderr_contains("Invalid repository URL");
    Ok(())
}

#[test]
fn list_shows_lock_state() -> Result<()> {
    let (project, _r, _s) = two_deps()?;
    let (t, _) = project.create_source_repo("t", &[("specledger/t.md", "t\n")])?;
    project.run_sl(&["deps", "add", &t.file_url(), "--alias", "t"])?.assert_success();

    let output = project.run_sl(&["deps", "list"])?;
    output.assert_success();
    let lines: Vec<&str> = output.stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with('r'));
    assert!(lines[1].starts_with('s'));
    assert!(lines[2].contains("not resolved"));
    Ok(())
}

#[test]
fn remove_then_resolve_drops_entry() -> Result<()> {
    let (project, _r, s) = two_deps()?;

    project.run_sl(&["deps", "remove", "s"])?.assert_success();
    project
        .run_sl(&["deps", "resolve"])?
        .assert_success()
        .assert_stdout_contains(&s.file_url());

    let lockfile = LockFile::load(&project.lockfile_path())?;
    assert_eq!(lockfile.entries.len(), 1);
    assert_eq!(lockfile.entries[0].artifact_path, "specs/");
    Ok(())
}

#[test]
fn remove_unknown_target_fails() -> Result<()> {
    let (project, _r, _s) = two_deps()?;
    project.run_sl(&["deps", "remove", "nope"])?.assert_code(1).assert_stderr_contains("nope");
    Ok(())
}

#[test]
fn update_with_filter_only_moves_selected() -> Result<()> {
    let (project, r, s) = two_deps()?;
    let s_before = commit_of(&project, "s")?;

    r.write_file("specs/x.md", "world\n")?;
    let r_after = r.commit_all("advance r")?;
    s.write_file("specledger/api.md", "# API v2\n")?;
    s.commit_all("advance s")?;

    project.run_sl(&["deps", "update", "r"])?.assert_success();
    assert_eq!(commit_of(&project, "r")?, r_after);
    assert_eq!(commit_of(&project, "s")?, s_before);
    Ok(())
}

#[test]
fn update_unknown_filter_fails() -> Result<()> {
    let (project, _r, _s) = two_deps()?;
    project.run_sl(&["deps", "update", "zzz"])?.assert_code(1);
    Ok(())
}

#[test]
fn verify_detects_unresolved_dependency() -> Result<()> {
    let (project, _r, _s) = two_deps()?;
    project.run_sl(&["deps", "verify"])?.assert_success().assert_stdout_contains("matches");
    project.run_sl(&["deps", "verify", "--content"])?.assert_success();

    let (t, _) = project.create_source_repo("t", &[("specledger/t.md", "t\n")])?;
    project.run_sl(&["deps", "add", &t.file_url(), "--alias", "t"])?.assert_success();
    let output = project.run_sl(&["deps", "verify"])?;
    output.assert_code(1);
    assert!(output.stdout.contains('✗'));
    Ok(())
}

#[test]
fn check_reports_no_conflicts() -> Result<()> {
    let (project, _r, _s) = two_deps()?;
    project.run_sl(&["deps", "check"])?.assert_success().assert_stdout_contains("No conflicts");
    project.run_sl(&["deps", "check", "--deep"])?.assert_success();
    Ok(())
}

#[test]
fn manifest_flag_works_from_another_directory() -> Result<()> {
    let (project, _r, _s) = two_deps()?;
    let elsewhere = tempfile::tempdir()?;
    let manifest = project.manifest_path();

    project
        .run_sl_in(
            elsewhere.path(),
            &["--manifest-path", &manifest.to_string_lossy(), "deps", "list"],
        )?
        .assert_success()
        .assert_stdout_contains("specs/");
    Ok(())
}
