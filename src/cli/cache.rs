//! `sl cache`: inspect and maintain the user-wide cache.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::collections::HashSet;

use super::common::{CommandContext, GlobalOptions, format_size, short_commit};
use crate::cache::Cache;

#[derive(Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Subcommand)]
enum CacheSubcommand {
    /// Show the cache root, its entries and their sizes
    Info,

    /// Remove entries the current project does not use
    Prune,

    /// Remove the whole cache
    Clean,
}

impl CacheCommand {
    pub async fn execute(self, options: &GlobalOptions) -> Result<()> {
        match self.command {
            CacheSubcommand::Info => {
                let cache = Cache::from_settings(&options.settings().await?);
                println!("Cache root: {}", cache.root().display());
                let entries = cache.list_entries().await?;
                if entries.is_empty() {
                    println!("No cached repositories");
                    return Ok(());
                }
                for entry in &entries {
                    let detail = entry.metadata.as_ref().map_or_else(
                        || "unreadable metadata".yellow().to_string(),
                        |m| format!("{} @ {} {}", m.repository_url, m.branch, short_commit(&m.commit_hash)),
                    );
                    println!("  {:<16} {:>10}  {}", entry.name.bold(), format_size(entry.size), detail);
                }
                let total: u64 = entries.iter().map(|e| e.size).sum();
                println!("Total: {} in {} entries", format_size(total), entries.len());
                Ok(())
            }
            CacheSubcommand::Prune => {
                let ctx = CommandContext::load(options).await?;
                let active: HashSet<String> =
                    ctx.project.manifest.dependencies.iter().map(Cache::entry_name).collect();
                let removed = ctx.cache().prune(&active).await?;
                if removed.is_empty() {
                    println!("{} Nothing to prune", "✓".green());
                } else {
                    for name in &removed {
                        println!("  {} {}", "-".red(), name);
                    }
                    println!("{} Pruned {} entries", "✓".green(), removed.len());
                }
                Ok(())
            }
            CacheSubcommand::Clean => {
                let cache = Cache::from_settings(&options.settings().await?);
                cache.clean()?;
                println!("{} Removed {}", "✓".green(), cache.root().display());
                Ok(())
            }
        }
    }
}
