//! `sl` entry point
//!
//! Parses the command line, runs the command, and renders any error with
//! its context and suggestion. Exit codes: `0` success, `1` error, `2` when
//! no project manifest was found.

use clap::Parser;
use specledger::cli;
use specledger::core::{exit_code, user_friendly_error};

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    if let Err(e) = cli.execute().await {
        let code = exit_code(&e);
        user_friendly_error(e).display();
        std::process::exit(code);
    }
}
