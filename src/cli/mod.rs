//! cli
//!
//! Command-line interface for hubcommit.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Initialize logging
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. Handlers build a [`crate::client::RepoClient`] from
//! configuration and print what it returns. Logs go to stderr so command
//! output on stdout stays machine-readable.

pub mod args;
pub mod commands;

pub use args::Cli;

use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Settings shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Explicit configuration file, if any.
    pub config_path: Option<PathBuf>,
    /// Token that replaces the installation token for every request.
    pub token: Option<String>,
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let ctx = Context {
        config_path: cli.config.clone(),
        token: cli.token.clone(),
    };

    commands::dispatch(cli.command, &ctx)
}

/// `RUST_LOG` wins; otherwise `--debug` selects debug output for this crate.
fn init_tracing(debug: bool) {
    let fallback = if debug { "hubcommit=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
