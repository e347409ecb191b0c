//! cli::commands::query
//!
//! Read-only commands plus `create-repo`.
//!
//! # Example
//!
//! ```bash
//! hubcommit repo docs-site
//! hubcommit branches docs-site
//! hubcommit ls docs-site main guides
//! hubcommit cat docs-site guides/intro.md --branch feature
//! ```

use std::io::Write;

use anyhow::{anyhow, Result};
use serde_json::json;

use super::{client, print_json};
use crate::cli::Context;
use crate::core::types::{BranchName, Sha};

pub async fn repo(ctx: &Context, name: &str) -> Result<()> {
    match client(ctx)?.get_repository(name).await? {
        Some(repository) => print_json(&repository),
        None => Err(anyhow!("Repository '{}' not found", name)),
    }
}

pub async fn default_branch(ctx: &Context, repo: &str) -> Result<()> {
    let branch = client(ctx)?.get_default_branch(repo).await?;
    println!("{}", branch);
    Ok(())
}

pub async fn create_repo(ctx: &Context, name: &str) -> Result<()> {
    let repository = client(ctx)?.create_repository(name).await?;
    print_json(&repository)
}

pub async fn branches(ctx: &Context, repo: &str) -> Result<()> {
    print_json(&client(ctx)?.list_branches(repo).await?)
}

pub async fn branch(ctx: &Context, repo: &str, branch: &BranchName) -> Result<()> {
    print_json(&client(ctx)?.get_branch(repo, branch).await?)
}

pub async fn tree(ctx: &Context, repo: &str, sha: &Sha, recursive: bool) -> Result<()> {
    print_json(&client(ctx)?.get_tree(repo, sha, recursive).await?)
}

pub async fn ls(ctx: &Context, repo: &str, branch: &BranchName, path: &str) -> Result<()> {
    for name in client(ctx)?.list_file_names(repo, branch, path).await? {
        println!("{}", name);
    }
    Ok(())
}

pub async fn cat(
    ctx: &Context,
    repo: &str,
    path: &str,
    branch: Option<&BranchName>,
) -> Result<()> {
    let bytes = client(ctx)?
        .get_file_bytes(repo, path, branch)
        .await?
        .ok_or_else(|| anyhow!("File '{}' not found in '{}'", path, repo))?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}

pub async fn status(ctx: &Context, repo: &str, sha: &Sha) -> Result<()> {
    let statuses = client(ctx)?.get_commit_statuses(repo, sha).await?;
    print_json(&json!({ "sha": sha, "statuses": statuses }))
}
