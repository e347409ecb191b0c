//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Loads configuration and builds a [`RepoClient`]
//! 2. Calls the client
//! 3. Prints the result (JSON for structured values, raw text otherwise)
//!
//! # Async Commands
//!
//! Every command talks to the network. Handlers are async and `dispatch`
//! drives them on a fresh tokio runtime.

mod push;
mod query;
mod token;

pub use push::{push, PushOptions};
pub use token::token;

use anyhow::{Context as _, Result};
use serde::Serialize;

use super::args::Command;
use super::Context;
use crate::client::RepoClient;
use crate::core::config::AppConfig;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(dispatch_async(command, ctx))
}

async fn dispatch_async(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Repo { name } => query::repo(ctx, &name).await,
        Command::DefaultBranch { repo } => query::default_branch(ctx, &repo).await,
        Command::CreateRepo { name } => query::create_repo(ctx, &name).await,
        Command::Branches { repo } => query::branches(ctx, &repo).await,
        Command::Branch { repo, branch } => query::branch(ctx, &repo, &branch).await,
        Command::Tree {
            repo,
            sha,
            recursive,
        } => query::tree(ctx, &repo, &sha, recursive).await,
        Command::Ls { repo, branch, path } => query::ls(ctx, &repo, &branch, &path).await,
        Command::Cat { repo, path, branch } => {
            query::cat(ctx, &repo, &path, branch.as_ref()).await
        }
        Command::Status { repo, sha } => query::status(ctx, &repo, &sha).await,
        Command::Token => token::token(ctx).await,
        Command::Push {
            repo,
            branch,
            message,
            new_branch,
            add,
            delete,
        } => {
            let opts = push::PushOptions {
                repo,
                branch,
                message,
                new_branch,
                add,
                delete,
            };
            push::push(ctx, opts).await
        }
    }
}

/// Load configuration honoring `--config`.
pub(crate) fn load_config(ctx: &Context) -> Result<AppConfig> {
    AppConfig::load(ctx.config_path.as_deref()).context("Failed to load configuration")
}

/// Build a client from configuration, applying `--token` when given.
pub(crate) fn client(ctx: &Context) -> Result<RepoClient> {
    let config = load_config(ctx)?;
    let client = RepoClient::from_config(&config).context("Failed to create GitHub client")?;
    Ok(match &ctx.token {
        Some(token) => client.with_token(token.clone()),
        None => client,
    })
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
