//! rverse CLI entry point.
//!
//! Handles argument parsing, logging setup, and mapping the top-level
//! `Result` to an exit code per §6 of the design doc: `0` success, `1`
//! resolution conflict, `2` manifest/config error, `3` metadata fetch
//! failure.

use anyhow::Result;
use clap::Parser;
use rverse_cli::cli::Cli;
use rverse_cli::core::error::user_friendly_error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let rust_log_exists = std::env::var("RUST_LOG").is_ok();
    let filter = if rust_log_exists {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    } else if cli.is_verbose() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let exit_code = e.exit_code();
            user_friendly_error(e).display();
            std::process::exit(exit_code);
        }
    }
}
