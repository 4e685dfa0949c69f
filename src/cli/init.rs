//! `sl init`: create a project manifest.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

use super::common::GlobalOptions;
use crate::constants::{DEFAULT_ARTIFACT_PATH, MANIFEST_FILE};
use crate::core::SpecLedgerError;
use crate::manifest::Manifest;

#[derive(Args)]
pub struct InitCommand {
    /// Project name (default: the directory name)
    #[arg(long)]
    name: Option<String>,

    /// 2-10 letter project code (default: derived from the name)
    #[arg(long)]
    short_code: Option<String>,

    /// Directory to initialise (default: current directory)
    path: Option<PathBuf>,
}

impl InitCommand {
    pub async fn execute(self, options: &GlobalOptions) -> Result<()> {
        let root = match self.path {
            Some(path) => path,
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        let manifest_path = options
            .manifest_path
            .clone()
            .unwrap_or_else(|| root.join(DEFAULT_ARTIFACT_PATH).join(MANIFEST_FILE));
        if manifest_path.exists() {
            return Err(SpecLedgerError::AlreadyExists {
                path: manifest_path.display().to_string(),
            }
            .into());
        }

        let name = self.name.unwrap_or_else(|| default_name(&root));
        let short_code = self.short_code.unwrap_or_else(|| default_short_code(&name));
        let manifest = Manifest::new(name, short_code);
        manifest.save(&manifest_path)?;

        println!("{} Created {}", "✓".green(), manifest_path.display());
        Ok(())
    }
}

fn default_name(root: &Path) -> String {
    let raw = root.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let name: String =
        raw.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' }).collect();
    if name.trim_matches('-').is_empty() { "project".to_string() } else { name }
}

/// Initials of the name's `-` separated words, padded from the first word.
fn default_short_code(name: &str) -> String {
    let words: Vec<&str> = name.split('-').filter(|w| !w.is_empty()).collect();
    let mut code: String = words.iter().filter_map(|w| w.chars().next()).collect();
    if code.len() < 2 {
        code = name.chars().filter(char::is_ascii_alphanumeric).take(3).collect();
    }
    if code.len() < 2 {
        code.push_str("PR");
    }
    code.chars().take(10).collect::<String>().to_ascii_uppercase()
}
