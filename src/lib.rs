//! hubcommit - commit file changes to GitHub repositories as a GitHub App
//!
//! hubcommit turns a list of file writes and deletions into a single commit
//! on a branch, using the Git Data API rather than a local clone. It
//! authenticates as a GitHub App installation and also answers the read
//! queries a publishing workflow needs (branches, trees, file contents,
//! commit statuses).
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, prints results)
//! - [`client`] - Public operations, including commit-and-push orchestration
//! - [`forge`] - Gateway trait, the GitHub implementation, and an in-memory mock
//! - [`auth`] - App assertions and installation token caching
//! - [`core`] - Domain types, listings, and configuration
//!
//! # Correctness Invariants
//!
//! 1. Deleting a path never leaves it reachable from the new commit's tree
//! 2. Each push creates exactly one commit and moves exactly one reference
//! 3. Tokens and private keys never appear in logs, errors, or debug output

pub mod auth;
pub mod cli;
pub mod client;
pub mod core;
pub mod forge;
