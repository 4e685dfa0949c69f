//! Command-line interface for SpecLedger.
//!
//! ```text
//! sl init --name <name> --short-code <code>
//! sl deps add <url> [--version <ref>] [--path <artifact_path>] [--alias <alias>]
//! sl deps remove <alias|url> [--path <artifact_path>]
//! sl deps list
//! sl deps resolve [--fetch-latest] [--deep]
//! sl deps update [<alias|url>] [--force]
//! sl deps verify [--content]
//! sl deps check [--deep]
//! sl vendor [--output <dir>] [--force]
//! sl refs validate [<spec>] [--strict]
//! sl refs list [<spec>]
//! sl cache info|prune|clean
//! ```
//!
//! Global flags (`--verbose`, `--quiet`, `--manifest-path`, `--cache-dir`,
//! `--max-parallel`, `--config`, `--no-progress`) apply to every command.
//!
//! Logging goes to stderr through `tracing_subscriber`; `RUST_LOG` overrides
//! the level chosen from `--verbose`/`--quiet`. Command output goes to stdout.

mod cache;
pub mod common;
mod deps;
mod init;
mod refs;
mod vendor;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::SettingsOverrides;
use common::GlobalOptions;

#[derive(Parser)]
#[command(
    name = "sl",
    about = "SpecLedger - Git-backed dependency ledger for specifications",
    version,
    long_about = "SpecLedger declares external specification dependencies in spec.mod, \
                  pins them to commits and content hashes in spec.sum, and keeps a \
                  user-wide cache of their Git repositories."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors and hide progress
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Global config file (default: ~/.specledger/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use this spec.mod instead of searching from the current directory
    #[arg(long, global = true)]
    manifest_path: Option<PathBuf>,

    /// Cache root (overrides SPECLEDGER_CACHE_DIR and the config file)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Dependencies fetched concurrently
    #[arg(long, global = true, value_parser = clap::value_parser!(u16).range(1..))]
    max_parallel: Option<u16>,

    /// Hide progress spinners
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create specledger/spec.mod in the current directory
    Init(init::InitCommand),

    /// Manage declared dependencies and the lockfile
    Deps(deps::DepsCommand),

    /// Copy locked artifacts into the project for offline use
    Vendor(vendor::VendorCommand),

    /// Inspect and validate references in a spec document
    Refs(refs::RefsCommand),

    /// Inspect and maintain the user-wide cache
    Cache(cache::CacheCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        init_logging(self.verbose, self.quiet);

        let options = GlobalOptions {
            manifest_path: self.manifest_path,
            overrides: SettingsOverrides {
                cache_dir: self.cache_dir,
                max_parallel: self.max_parallel.map(usize::from),
                config_path: self.config,
            },
            no_progress: self.no_progress || self.quiet,
        };

        match self.command {
            Commands::Init(cmd) => cmd.execute(&options).await,
            Commands::Deps(cmd) => cmd.execute(&options).await,
            Commands::Vendor(cmd) => cmd.execute(&options).await,
            Commands::Refs(cmd) => cmd.execute(&options).await,
            Commands::Cache(cmd) => cmd.execute(&options).await,
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "sl",
            "deps",
            "resolve",
            "--fetch-latest",
            "--max-parallel",
            "2",
            "--cache-dir",
            "/tmp/c",
        ])
        .unwrap();
        assert_eq!(cli.max_parallel, Some(2));
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/c")));
    }

    #[test]
    fn test_max_parallel_must_be_positive() {
        assert!(Cli::try_parse_from(["sl", "deps", "resolve", "--max-parallel", "0"]).is_err());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["sl", "-v", "-q", "deps", "list"]).is_err());
    }
}
