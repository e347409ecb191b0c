//! cli::commands::push
//!
//! Commit local files and deletions to a branch in one commit.
//!
//! # Example
//!
//! ```bash
//! hubcommit push docs-site main -m "Update intro" --add guides/intro.md=./intro.md
//! hubcommit push docs-site cleanup -m "Drop old guide" --new-branch --delete guides/old.md
//! ```

use anyhow::{bail, Context as _, Result};
use tracing::debug;

use super::{client, print_json};
use crate::cli::args::AddSpec;
use crate::cli::Context;
use crate::client::PushRequest;
use crate::core::types::{BranchName, FileChange};

/// Options for the push command.
#[derive(Debug)]
pub struct PushOptions {
    pub repo: String,
    pub branch: BranchName,
    pub message: String,
    pub new_branch: bool,
    pub add: Vec<AddSpec>,
    pub delete: Vec<String>,
}

pub async fn push(ctx: &Context, opts: PushOptions) -> Result<()> {
    let changes = collect_changes(&opts.add, &opts.delete)?;
    if changes.is_empty() {
        bail!("Nothing to commit. Pass --add DEST=LOCAL or --delete DEST.");
    }

    let request = PushRequest::new(&opts.repo, opts.branch.clone(), &opts.message)
        .changes(changes)
        .creating_branch(opts.new_branch);

    let commit = client(ctx)?
        .create_commit_and_push(&request)
        .await
        .with_context(|| format!("Failed to push to '{}' in '{}'", opts.branch, opts.repo))?;

    print_json(&commit)
}

/// Read every `--add` file and append `--delete` markers, in that order.
fn collect_changes(add: &[AddSpec], delete: &[String]) -> Result<Vec<FileChange>> {
    let mut changes = Vec::with_capacity(add.len() + delete.len());
    for spec in add {
        let content = std::fs::read(&spec.source)
            .with_context(|| format!("Failed to read '{}'", spec.source.display()))?;
        debug!(dest = %spec.dest, bytes = content.len(), "read local file");
        changes.push(FileChange::write(spec.dest.clone(), content));
    }
    changes.extend(delete.iter().map(FileChange::delete));
    Ok(changes)
}
