use anyhow::Result;

use crate::common::TestProject;

fn with_two_cached() -> Result<TestProject> {
    let project = TestProject::initialized()?;
    let (r, _) = project.create_source_repo("r", &[("specledger/r.md", "r\n")])?;
    let (s, _) = project.create_source_repo("s", &[("specledger/s.md", "s\n")])?;
    project.run_sl(&["deps", "add", &r.file_url(), "--alias", "r"])?.assert_success();
    project.run_sl(&["deps", "add", &s.file_url(), "--alias", "s"])?.assert_success();
    project.run_sl(&["deps", "resolve"])?.assert_success();
    Ok(project)
}

#[test]
fn info_lists_entries() -> Result<()> {
    let project = with_two_cached()?;
    project
        .run_sl(&["cache", "info"])?
        .assert_success()
        .assert_stdout_contains("Cache root:")
        .assert_stdout_contains("in 2 entries");
    Ok(())
}

#[test]
fn info_on_empty_cache() -> Result<()> {
    let project = TestProject::new()?;
    project.run_sl(&["cache", "info"])?.assert_success().assert_stdout_contains("No cached repositories");
    Ok(())
}

#[test]
fn prune_removes_unused_entries() -> Result<()> {
    let project = with_two_cached()?;
    project.run_sl(&["deps", "remove", "s"])?.assert_success();

    project
        .run_sl(&["cache", "prune"])?
        .assert_success()
        .assert_stdout_contains("Pruned 1 entries");
    assert!(project.cache_path().join("r").join("repo").is_dir());
    assert!(!project.cache_path().join("s").exists());

    project.run_sl(&["cache", "prune"])?.assert_success().assert_stdout_contains("Nothing to prune");
    Ok(())
}

#[test]
fn clean_then_resolve_refetches() -> Result<()> {
    let project = with_two_cached()?;
    let before = project.read_file("specledger/spec.sum")?;

    project.run_sl(&["cache", "clean"])?.assert_success();
    assert!(!project.cache_path().exists());

    project.run_sl(&["deps", "resolve"])?.assert_success();
    assert!(project.cache_path().join("r").join("repo").join("specledger").join("r.md").is_file());
    assert_eq!(project.read_file("specledger/spec.sum")?, before);
    Ok(())
}
