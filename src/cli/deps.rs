//! `sl deps`: manage declared dependencies and the lockfile.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use super::common::{CommandContext, GlobalOptions, cancel_on_ctrl_c, format_size, short_commit};
use crate::core::SpecLedgerError;
use crate::git::origin_url;
use crate::manifest::NewDependency;
use crate::resolver::{ResolveOptions, ResolveOutcome};

#[derive(Args)]
pub struct DepsCommand {
    #[command(subcommand)]
    command: DepsSubcommand,
}

#[derive(Subcommand)]
enum DepsSubcommand {
    /// Declare a dependency in spec.mod
    Add {
        /// Repository URL (https, http, ssh, git@host:path or file://)
        url: String,

        /// Branch, tag or commit (default: main)
        #[arg(long)]
        version: Option<String>,

        /// Directory or file inside the repository (default: specledger/)
        #[arg(long = "path")]
        artifact_path: Option<String>,

        /// Name used in references (default: derived from the URL)
        #[arg(long)]
        alias: Option<String>,
    },

    /// Remove a dependency by alias or URL
    Remove {
        /// Alias or repository URL
        target: String,

        /// Artifact path, to pick one of several entries for the same URL
        #[arg(long = "path")]
        artifact_path: Option<String>,
    },

    /// Show declared dependencies and their locked commits
    List,

    /// Pin every dependency in spec.sum
    Resolve {
        /// Move every dependency to the tip of its version
        #[arg(long)]
        fetch_latest: bool,

        /// Also detect version conflicts with dependencies' own lockfiles
        #[arg(long)]
        deep: bool,
    },

    /// Move dependencies to the tip of their versions
    Update {
        /// Only this alias or URL
        filter: Option<String>,

        /// Re-clone cache entries from scratch
        #[arg(long)]
        force: bool,
    },

    /// Check spec.sum against spec.mod
    Verify {
        /// Also re-hash cached artifacts at their locked commits
        #[arg(long)]
        content: bool,
    },

    /// Report conflicts without fetching anything
    Check {
        /// Include dependencies' own lockfiles
        #[arg(long)]
        deep: bool,
    },
}

impl DepsCommand {
    pub async fn execute(self, options: &GlobalOptions) -> Result<()> {
        let mut ctx = CommandContext::load(options).await?;

        match self.command {
            DepsSubcommand::Add {
                url,
                version,
                artifact_path,
                alias,
            } => {
                let project_url = origin_url(&ctx.project.root).await?;
                let added = ctx
                    .project
                    .manifest
                    .add_dependency(
                        NewDependency {
                            repository_url: url,
                            version,
                            artifact_path,
                            alias,
                        },
                        project_url.as_deref(),
                    )?
                    .clone();
                ctx.project.save_manifest()?;
                println!(
                    "{} Added {} ({} @ {}, {})",
                    "✓".green(),
                    added.alias_or_empty().bold(),
                    added.repository_url,
                    added.version,
                    added.artifact_path
                );
                println!("Run {} to pin it", "sl deps resolve".cyan());
                Ok(())
            }
            DepsSubcommand::Remove {
                target,
                artifact_path,
            } => {
                let removed =
                    ctx.project.manifest.remove_dependency(&target, artifact_path.as_deref())?;
                ctx.project.save_manifest()?;
                println!(
                    "{} Removed {} ({})",
                    "✓".green(),
                    removed.alias_or_empty().bold(),
                    removed.repository_url
                );
                Ok(())
            }
            DepsSubcommand::List => list(&ctx),
            DepsSubcommand::Resolve {
                fetch_latest,
                deep,
            } => {
                let resolve_options = ResolveOptions {
                    fetch_latest,
                    deep,
                    max_parallel: ctx.settings.max_parallel,
                    filter: None,
                    force: false,
                };
                let spinner = options.spinner("Resolving dependencies");
                let outcome =
                    ctx.resolver().resolve(&ctx.project, &resolve_options, &cancel_on_ctrl_c()).await;
                spinner.finish_and_clear();
                report(&outcome?);
                Ok(())
            }
            DepsSubcommand::Update {
                filter,
                force,
            } => {
                let spinner = options.spinner("Updating dependencies");
                let outcome = ctx
                    .resolver()
                    .update(&ctx.project, filter, force, ctx.settings.max_parallel, &cancel_on_ctrl_c())
                    .await;
                spinner.finish_and_clear();
                report(&outcome?);
                Ok(())
            }
            DepsSubcommand::Verify {
                content,
            } => {
                let lockfile = ctx.load_lockfile()?;
                let mut issues = lockfile.verify(&ctx.project.manifest).issues;
                if content {
                    let spinner = options.spinner("Hashing cached artifacts");
                    let extra = ctx.resolver().verify_content(&ctx.project, &lockfile, &cancel_on_ctrl_c()).await;
                    spinner.finish_and_clear();
                    issues.extend(extra?);
                }

                if issues.is_empty() {
                    println!("{} spec.sum matches spec.mod", "✓".green());
                    return Ok(());
                }
                for issue in &issues {
                    println!("  {} {}", "✗".red(), issue);
                }
                Err(SpecLedgerError::Other {
                    message: format!("{} lockfile issue(s) found", issues.len()),
                }
                .into())
            }
            DepsSubcommand::Check {
                deep,
            } => {
                let conflicts = ctx.resolver().check(&ctx.project, deep).await?;
                if conflicts.is_empty() {
                    println!("{} No conflicts", "✓".green());
                    return Ok(());
                }
                Err(SpecLedgerError::ConflictError {
                    conflicts,
                }
                .into())
            }
        }
    }
}

fn list(ctx: &CommandContext) -> Result<()> {
    let deps = &ctx.project.manifest.dependencies;
    if deps.is_empty() {
        println!("No dependencies declared in {}", ctx.project.manifest_path.display());
        return Ok(());
    }

    let lockfile = ctx.load_lockfile()?;
    for dep in deps {
        let locked = match lockfile.entry_for(dep) {
            Some(entry) => format!(
                "{} ({})",
                short_commit(&entry.commit_hash).green(),
                format_size(entry.size)
            ),
            None => "not resolved".yellow().to_string(),
        };
        println!(
            "{:<16} {} @ {} [{}] {}",
            dep.alias_or_empty().bold(),
            dep.repository_url,
            dep.version,
            dep.artifact_path,
            locked
        );
    }
    Ok(())
}

fn report(outcome: &ResolveOutcome) {
    for warning in &outcome.warnings {
        eprintln!("{} {}", "warning:".yellow(), warning);
    }
    for alias in &outcome.changed {
        println!("  {} {}", "↻".cyan(), alias);
    }
    for entry in &outcome.removed {
        println!("  {} {} {}", "-".red(), entry.repository_url, entry.artifact_path);
    }

    let count = outcome.lockfile.entries.len();
    if outcome.written {
        println!(
            "{} Locked {} dependencies ({}) in spec.sum",
            "✓".green(),
            count,
            format_size(outcome.lockfile.total_size)
        );
    } else {
        println!("{} spec.sum already up to date ({} dependencies)", "✓".green(), count);
    }
}
