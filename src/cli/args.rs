//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Read configuration from this file
//! - `--debug`: Enable debug logging
//! - `--token <token>`: Authenticate with this token instead of the app installation
//!   (full app configuration is still required)

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::types::{BranchName, Sha};

/// hubcommit - commit file changes to GitHub repositories as a GitHub App
#[derive(Parser, Debug)]
#[command(name = "hubcommit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the default locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Authenticate with this token instead of an installation token
    ///
    /// The configuration is still loaded and validated in full, so the app
    /// id, installation id and private key must be set even when a token is
    /// given.
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// A `--add DEST=LOCAL` pair: write the local file at `DEST` in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddSpec {
    pub dest: String,
    pub source: PathBuf,
}

fn parse_add(value: &str) -> Result<AddSpec, String> {
    let (dest, source) = value
        .split_once('=')
        .ok_or_else(|| format!("expected DEST=LOCAL, got '{}'", value))?;
    if dest.is_empty() || source.is_empty() {
        return Err(format!("expected DEST=LOCAL, got '{}'", value));
    }
    Ok(AddSpec {
        dest: dest.to_string(),
        source: PathBuf::from(source),
    })
}

fn parse_branch(value: &str) -> Result<BranchName, String> {
    BranchName::new(value).map_err(|e| e.to_string())
}

fn parse_sha(value: &str) -> Result<Sha, String> {
    Sha::new(value).map_err(|e| e.to_string())
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show repository metadata
    Repo {
        /// Repository name
        name: String,
    },

    /// Print the repository's default branch
    #[command(name = "default-branch")]
    DefaultBranch {
        /// Repository name
        repo: String,
    },

    /// Create a private repository with an initial commit
    #[command(name = "create-repo")]
    CreateRepo {
        /// Repository name
        name: String,
    },

    /// List branches
    Branches {
        /// Repository name
        repo: String,
    },

    /// Show one branch
    Branch {
        /// Repository name
        repo: String,
        /// Branch name
        #[arg(value_parser = parse_branch)]
        branch: BranchName,
    },

    /// Show a tree by tree or commit id
    Tree {
        /// Repository name
        repo: String,
        /// Tree or commit id
        #[arg(value_parser = parse_sha)]
        sha: Sha,
        /// Flatten nested directories into one listing
        #[arg(long)]
        recursive: bool,
    },

    /// List files directly inside a directory
    #[command(
        name = "ls",
        after_help = "\
EXAMPLES:
    # Top-level files on main
    hubcommit ls docs-site main

    # Files in one directory (subdirectories are not descended)
    hubcommit ls docs-site main guides"
    )]
    Ls {
        /// Repository name
        repo: String,
        /// Branch name
        #[arg(value_parser = parse_branch)]
        branch: BranchName,
        /// Directory path; "/", "." and "./" denote the root
        #[arg(default_value = "/")]
        path: String,
    },

    /// Print a file's raw content
    Cat {
        /// Repository name
        repo: String,
        /// File path
        path: String,
        /// Read from this branch instead of the default branch
        #[arg(long, value_parser = parse_branch)]
        branch: Option<BranchName>,
    },

    /// List statuses reported for a commit
    Status {
        /// Repository name
        repo: String,
        /// Commit id
        #[arg(value_parser = parse_sha)]
        sha: Sha,
    },

    /// Print an installation access token
    Token,

    /// Commit file changes to a branch in one commit
    #[command(
        name = "push",
        long_about = "Commit file changes to a branch in one commit.\n\n\
            The new commit is parented on the tip of the repository's default branch. \
            With --new-branch the branch is created and must not exist yet; otherwise \
            it must exist and is moved to the new commit.",
        after_help = "\
EXAMPLES:
    # Update one file on main
    hubcommit push docs-site main -m \"Update intro\" --add guides/intro.md=./intro.md

    # Add and delete on a new branch
    hubcommit push docs-site feature -m \"Rework guides\" --new-branch \\
        --add guides/new.md=./new.md --delete guides/old.md"
    )]
    Push {
        /// Repository name
        repo: String,
        /// Target branch
        #[arg(value_parser = parse_branch)]
        branch: BranchName,
        /// Commit message
        #[arg(short, long)]
        message: String,
        /// Create the branch instead of updating it
        #[arg(long)]
        new_branch: bool,
        /// Write a local file into the repository
        #[arg(long = "add", value_name = "DEST=LOCAL", value_parser = parse_add)]
        add: Vec<AddSpec>,
        /// Delete a path from the repository
        #[arg(long = "delete", value_name = "DEST")]
        delete: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_push_with_changes() {
        let cli = Cli::try_parse_from([
            "hubcommit",
            "push",
            "docs",
            "feature/x",
            "-m",
            "msg",
            "--new-branch",
            "--add",
            "a/b.md=./local.md",
            "--delete",
            "old.md",
        ])
        .unwrap();

        match cli.command {
            Command::Push {
                repo,
                branch,
                message,
                new_branch,
                add,
                delete,
            } => {
                assert_eq!(repo, "docs");
                assert_eq!(branch.as_str(), "feature/x");
                assert_eq!(message, "msg");
                assert!(new_branch);
                assert_eq!(
                    add,
                    vec![AddSpec {
                        dest: "a/b.md".into(),
                        source: PathBuf::from("./local.md")
                    }]
                );
                assert_eq!(delete, vec!["old.md"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn ls_defaults_to_root() {
        let cli = Cli::try_parse_from(["hubcommit", "ls", "docs", "main"]).unwrap();
        assert!(matches!(cli.command, Command::Ls { ref path, .. } if path == "/"));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["hubcommit", "branches", "docs", "--debug", "--token", "t"])
                .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.token.as_deref(), Some("t"));
    }

    #[test]
    fn token_help_states_configuration_is_still_required() {
        let command = Cli::command();
        let token = command
            .get_arguments()
            .find(|arg| arg.get_id() == "token")
            .unwrap();
        let help = token.get_long_help().unwrap().to_string();
        assert!(help.contains("private key must be set"));
    }

    #[test]
    fn rejects_invalid_branch_and_add_spec() {
        assert!(Cli::try_parse_from(["hubcommit", "branch", "docs", "bad..name"]).is_err());
        assert!(Cli::try_parse_from([
            "hubcommit", "push", "docs", "main", "-m", "x", "--add", "no-equals"
        ])
        .is_err());
    }
}
