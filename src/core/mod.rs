//! core
//!
//! Core domain types, listings, and configuration.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Sha, RefName, trees, commits
//! - [`listing`] - Directory listings derived from recursive trees
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - A deletion is a variant, not a missing value
//! - Everything here is free of network I/O

pub mod config;
pub mod listing;
pub mod types;
