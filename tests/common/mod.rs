//! Common test utilities and fixtures for SpecLedger integration tests
//!
//! [`TestProject`] owns a temp directory holding a project, an isolated cache
//! root and any number of fixture repositories, and runs the `sl` binary
//! against them.

// Not every suite uses every helper.
#![allow(dead_code)]

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub use specledger::test_utils::{TestGit, fixture_repo};

/// Test project with its own cache and fixture repositories
pub struct TestProject {
    _temp_dir: TempDir,
    project_dir: PathBuf,
    cache_dir: PathBuf,
    sources_dir: PathBuf,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let project_dir = temp_dir.path().join("project");
        let cache_dir = temp_dir.path().join("cache");
        let sources_dir = temp_dir.path().join("sources");
        fs::create_dir_all(&project_dir)?;
        fs::create_dir_all(&sources_dir)?;

        Ok(Self {
            _temp_dir: temp_dir,
            project_dir,
            cache_dir,
            sources_dir,
        })
    }

    /// New project with `sl init` already run.
    pub fn initialized() -> Result<Self> {
        let project = Self::new()?;
        project.run_sl(&["init", "--name", "demo", "--short-code", "DM"])?.assert_success();
        Ok(project)
    }

    pub fn project_path(&self) -> &Path {
        &self.project_dir
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.project_dir.join("specledger").join("spec.mod")
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.project_dir.join("specledger").join("spec.sum")
    }

    /// Fixture repository `sources/<name>` with `files` committed on `main`.
    pub fn create_source_repo(&self, name: &str, files: &[(&str, &str)]) -> Result<(TestGit, String)> {
        fixture_repo(&self.sources_dir.join(name), files)
    }

    pub fn write_file(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.project_dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn read_file(&self, rel: &str) -> Result<String> {
        let path = self.project_dir.join(rel);
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }

    /// Run `sl` in the project directory with an isolated cache.
    pub fn run_sl(&self, args: &[&str]) -> Result<CommandOutput> {
        self.run_sl_in(&self.project_dir, args)
    }

    pub fn run_sl_in(&self, dir: &Path, args: &[&str]) -> Result<CommandOutput> {
        let output = Command::new(env!("CARGO_BIN_EXE_sl"))
            .args(args)
            .current_dir(dir)
            .env("SPECLEDGER_CACHE_DIR", &self.cache_dir)
            .env("SPECLEDGER_CONFIG", self.cache_dir.join("no-config.toml"))
            .env("SPECLEDGER_NO_PROGRESS", "1")
            .env("NO_COLOR", "1")
            .env("GIT_TERMINAL_PROMPT", "0")
            .env_remove("RUST_LOG")
            .output()
            .context("Failed to run sl")?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        })
    }
}

/// Captured output of one `sl` run
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn assert_success(&self) -> &Self {
        assert!(
            self.success(),
            "Command failed with code {:?}\nStdout: {}\nStderr: {}",
            self.code,
            self.stdout,
            self.stderr
        );
        self
    }

    pub fn assert_code(&self, code: i32) -> &Self {
        assert_eq!(
            self.code,
            Some(code),
            "Unexpected exit code\nStdout: {}\nStderr: {}",
            self.stdout,
            self.stderr
        );
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(self.stdout.contains(text), "Expected stdout to contain '{text}'\nStdout: {}", self.stdout);
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(self.stderr.contains(text), "Expected stderr to contain '{text}'\nStderr: {}", self.stderr);
        self
    }
}
