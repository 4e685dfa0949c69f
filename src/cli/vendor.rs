//! `sl vendor`: copy locked artifacts into the project, or remove them again.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use super::common::{CommandContext, GlobalOptions, cancel_on_ctrl_c};
use crate::constants::DEFAULT_VENDOR_DIR;
use crate::resolver::{clean_vendor, vendor};

#[derive(Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct VendorCommand {
    #[command(subcommand)]
    command: Option<VendorSubcommand>,

    /// Output directory, relative to the project root
    #[arg(short, long, default_value = DEFAULT_VENDOR_DIR)]
    output: PathBuf,

    /// Rewrite files even when their bytes already match
    #[arg(long)]
    force: bool,
}

#[derive(Subcommand)]
enum VendorSubcommand {
    /// Remove the vendor output directory
    Clean {
        /// Output directory, relative to the project root
        #[arg(short, long, default_value = DEFAULT_VENDOR_DIR)]
        output: PathBuf,
    },
}

impl VendorCommand {
    pub async fn execute(self, options: &GlobalOptions) -> Result<()> {
        let ctx = CommandContext::load(options).await?;

        if let Some(VendorSubcommand::Clean {
            output,
        }) = self.command
        {
            let output = ctx.project.root.join(output);
            if clean_vendor(&ctx.project, &output).await? {
                println!("{} Removed {}", "✓".green(), output.display());
            } else {
                println!("{} Nothing to remove at {}", "✓".green(), output.display());
            }
            return Ok(());
        }

        let output = ctx.project.root.join(&self.output);
        let spinner = options.spinner("Vendoring dependencies");
        let stats = vendor(&ctx.project, &ctx.cache(), &output, self.force, &cancel_on_ctrl_c()).await;
        spinner.finish_and_clear();
        let stats = stats?;

        if stats.written == 0 && stats.removed == 0 {
            println!("{} {} already up to date", "✓".green(), output.display());
        } else {
            println!(
                "{} Vendored {} dependencies into {} ({} written, {} unchanged, {} removed)",
                "✓".green(),
                stats.dependencies,
                output.display(),
                stats.written,
                stats.skipped,
                stats.removed
            );
        }
        Ok(())
    }
}
