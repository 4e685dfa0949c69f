//! `sl refs`: list and validate references in a spec document.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use super::common::{CommandContext, GlobalOptions};
use crate::constants::DEFAULT_SPEC_FILE;
use crate::core::SpecLedgerError;
use crate::refs::{Reference, ReferenceError, Target, parse_spec, resolve_with_cache, validate};

#[derive(Args)]
pub struct RefsCommand {
    #[command(subcommand)]
    command: RefsSubcommand,
}

#[derive(Subcommand)]
enum RefsSubcommand {
    /// Check that every reference names a locked dependency
    Validate {
        /// Spec document
        #[arg(default_value = DEFAULT_SPEC_FILE)]
        spec_path: PathBuf,

        /// Exit with an error when any reference is invalid
        #[arg(short, long)]
        strict: bool,
    },

    /// Print every reference with its position
    List {
        /// Spec document
        #[arg(default_value = DEFAULT_SPEC_FILE)]
        spec_path: PathBuf,
    },
}

impl RefsCommand {
    pub async fn execute(self, options: &GlobalOptions) -> Result<()> {
        let ctx = CommandContext::load(options).await?;
        match self.command {
            RefsSubcommand::Validate {
                spec_path,
                strict,
            } => validate_refs(&ctx, &spec_path, strict),
            RefsSubcommand::List {
                spec_path,
            } => {
                let references = read_references(&spec_path)?;
                println!("References in {} ({} total):", spec_path.display(), references.len());
                for (i, reference) in references.iter().enumerate() {
                    println!(
                        "{:>3}. [{}] {} {}",
                        i + 1,
                        reference.kind,
                        reference.raw,
                        format!("{}:{}", reference.line, reference.column).dimmed()
                    );
                }
                Ok(())
            }
        }
    }
}

fn read_references(spec_path: &Path) -> Result<Vec<Reference>> {
    let text = std::fs::read_to_string(spec_path)
        .with_context(|| format!("Failed to read spec file {}", spec_path.display()))?;
    Ok(parse_spec(&text))
}

fn validate_refs(ctx: &CommandContext, spec_path: &Path, strict: bool) -> Result<()> {
    let lockfile_path = ctx.project.lockfile_path();
    if !lockfile_path.exists() {
        return Err(SpecLedgerError::NotFound {
            what: format!("lockfile {} (run `sl deps resolve` first)", lockfile_path.display()),
        }
        .into());
    }
    let lockfile = ctx.load_lockfile()?;
    let locked = lockfile.by_alias(&ctx.project.manifest);

    let references = read_references(spec_path)?;
    let mut errors = validate(&references, locked.keys().copied());

    let cache = ctx.cache();
    for reference in &references {
        let Target::Dependency {
            alias,
            artifact: Some(artifact),
            ..
        } = &reference.target
        else {
            continue;
        };
        let Some((dep, _)) = locked.get(alias.as_str()) else {
            continue;
        };
        let Some(worktree) = cache.locate(dep) else {
            continue;
        };
        if let Err(error) = resolve_with_cache(
            &ctx.project.manifest.project.artifact_path,
            alias,
            &dep.artifact_path,
            artifact,
            Some(&ctx.project.root),
            &worktree,
        ) {
            errors.push(ReferenceError {
                reference: reference.clone(),
                error,
                suggestion: None,
            });
        }
    }

    println!("Found {} references in {}", references.len(), spec_path.display());
    if errors.is_empty() {
        println!("{} All references are valid", "✓".green());
        return Ok(());
    }

    for error in &errors {
        println!("  {} {}", "✗".red(), error);
    }
    if strict {
        return Err(SpecLedgerError::Other {
            message: format!("{} invalid reference(s) in {}", errors.len(), spec_path.display()),
        }
        .into());
    }
    println!("{}", format!("{} invalid reference(s)", errors.len()).yellow());
    Ok(())
}
