//! Stencil CLI entry point.
//!
//! This is the main executable for the Stencil scaffolding engine. It
//! handles command-line argument parsing, logging setup, and error
//! display, then delegates everything else to `stencil_engine::driver::Driver`
//! through the thin `stencil_engine::cli` front end.
//!
//! The CLI supports:
//! - (default) - render the project from `stencil.yaml`
//! - `upgrade` - re-resolve every module to its latest satisfying version, then render
//! - `lockfile prune` - remove `stencil.lock` entries for files missing on disk
//! - `describe <path>` - print which module/template produced a path
//! - `create module <name>` - out of scope for this build

use anyhow::Result;
use clap::Parser;
use stencil_engine::cli;
use stencil_engine::core::error::user_friendly_error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = cli.build_config();

    // RUST_LOG always wins; otherwise --debug raises the default to
    // debug; with neither, logging is off.
    let rust_log_exists = std::env::var("RUST_LOG").is_ok();
    let is_debug = config.log_level.as_deref() == Some("debug");

    let filter = if rust_log_exists {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    } else if is_debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("off")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute_with_config(config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
