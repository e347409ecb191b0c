//! forge
//!
//! Gateway to the remote hosting API.
//!
//! # Architecture
//!
//! The `RepoGateway` trait defines one operation per remote concept:
//! repositories, branches, references, trees, blobs, commits, raw contents,
//! and commit statuses. The commit orchestration in [`crate::client`] is
//! written against the trait only, so it runs unchanged over the GitHub
//! implementation and the in-memory mock.
//!
//! - Every operation takes an optional explicit token; otherwise the
//!   gateway's token provider supplies one
//! - Reads where absence is expected return [`Lookup`]
//! - Tree construction for a change set lives in [`tree`] and is shared by
//!   all implementations through `RepoGateway::create_tree_with_changes`
//!
//! # Modules
//!
//! - `traits`: Core `RepoGateway` trait, `GatewayError`, `Lookup`
//! - [`github`]: GitHub REST implementation
//! - [`tree`]: Incremental and reconstructed tree requests
//! - [`mock`]: In-memory implementation for deterministic testing
//!
//! # Example
//!
//! ```ignore
//! use hubcommit::forge::{github::GitHubGateway, RepoGateway};
//!
//! let gateway = GitHubGateway::from_config(&config)?;
//! let branches = gateway.list_branches("docs-site", None).await?;
//! for branch in branches {
//!     println!("{} {}", branch.name, branch.sha.short(7));
//! }
//! ```

pub mod github;
pub mod mock;
mod traits;
pub mod tree;

pub use traits::*;
