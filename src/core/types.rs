//! core::types
//!
//! Strong types for the remote object model and commit requests.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`Sha`] - Object identifier assigned by the hosting API
//! - [`RefName`] - Fully-qualified reference name (`refs/heads/<branch>`)
//! - [`FileChange`] / [`FileContent`] - One path to write or delete in a commit
//! - [`Tree`] / [`TreeEntry`] - A tree as returned by the hosting API
//! - [`TreeRequest`] / [`NewTreeEntry`] - A tree submission payload
//! - [`Commit`], [`Reference`], [`Repository`], [`Branch`], [`CommitStatus`]
//!
//! # Validation
//!
//! Names and ids enforce validity at construction time, so an invalid
//! branch or object id can never reach the gateway.
//!
//! # Examples
//!
//! ```
//! use hubcommit::core::types::{BranchName, FileChange, RefName, Sha};
//!
//! let branch = BranchName::new("feature/my-branch").unwrap();
//! let refname = RefName::for_branch(&branch);
//! assert_eq!(refname.as_str(), "refs/heads/feature/my-branch");
//!
//! let change = FileChange::delete("docs/old.md");
//! assert!(change.is_deletion());
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Sha::new("not-a-sha").is_err());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidSha(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty or exactly `@`
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
///
/// # Example
///
/// ```
/// use hubcommit::core::types::BranchName;
///
/// let name = BranchName::new("feature/my-branch").unwrap();
/// assert_eq!(name.as_str(), "feature/my-branch");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new(".hidden").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let invalid = |msg: &str| Err(TypeError::InvalidBranchName(msg.to_string()));

        if name.is_empty() {
            return invalid("branch name cannot be empty");
        }
        if name == "@" {
            return invalid("branch name cannot be '@' (reserved)");
        }
        if name.starts_with('.') || name.starts_with('-') {
            return invalid("branch name cannot start with '.' or '-'");
        }
        if name.ends_with(".lock") || name.ends_with('/') {
            return invalid("branch name cannot end with '.lock' or '/'");
        }
        for sequence in ["..", "@{", "//"] {
            if name.contains(sequence) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{sequence}'"
                )));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(TypeError::InvalidBranchName(format!(
                "branch name cannot contain '{c}'"
            )));
        }
        if name.chars().any(|c| c.is_ascii_control()) {
            return invalid("branch name cannot contain control characters");
        }

        for component in name.split('/') {
            if component.starts_with('.') {
                return invalid("path component cannot start with '.'");
            }
            if component.ends_with(".lock") {
                return invalid("path component cannot end with '.lock'");
            }
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An object identifier (SHA-1 or SHA-256 hex) assigned by the hosting API.
///
/// Ids are normalized to lowercase.
///
/// # Example
///
/// ```
/// use hubcommit::core::types::Sha;
///
/// let sha = Sha::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(sha.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(sha.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha(String);

impl Sha {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidSha` if the string is not 40 or 64 hex characters.
    pub fn new(sha: impl Into<String>) -> Result<Self, TypeError> {
        let sha = sha.into().to_ascii_lowercase();
        if sha.len() != 40 && sha.len() != 64 {
            return Err(TypeError::InvalidSha(format!(
                "expected 40 or 64 hex characters, got {}",
                sha.len()
            )));
        }
        if !sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidSha("object id must be hexadecimal".into()));
        }
        Ok(Self(sha))
    }

    /// Get an abbreviated form of the id.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Sha {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Sha> for String {
    fn from(sha: Sha) -> Self {
        sha.0
    }
}

impl AsRef<str> for Sha {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sha {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully-qualified reference name such as `refs/heads/main`.
///
/// # Example
///
/// ```
/// use hubcommit::core::types::{BranchName, RefName};
///
/// let branch = BranchName::new("feature/foo").unwrap();
/// let refname = RefName::for_branch(&branch);
/// assert_eq!(refname.as_str(), "refs/heads/feature/foo");
/// assert_eq!(refname.without_namespace(), "heads/feature/foo");
/// assert_eq!(refname.branch(), Some("feature/foo"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` unless the name is `refs/<kind>/<name>`
    /// with a valid branch-style remainder.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let rest = name
            .strip_prefix("refs/")
            .ok_or_else(|| TypeError::InvalidRefName(format!("'{name}' must start with 'refs/'")))?;
        match rest.split_once('/') {
            Some((kind, short)) if !kind.is_empty() => {
                BranchName::new(short)
                    .map_err(|e| TypeError::InvalidRefName(format!("'{name}': {e}")))?;
            }
            _ => {
                return Err(TypeError::InvalidRefName(format!(
                    "'{name}' must have the form refs/<kind>/<name>"
                )))
            }
        }
        Ok(Self(name))
    }

    /// Create a ref name for a branch (`refs/heads/<branch>`).
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("refs/heads/{}", branch.as_str()))
    }

    /// The name without the leading `refs/`, as used in Git Data API paths.
    pub fn without_namespace(&self) -> &str {
        self.0.strip_prefix("refs/").unwrap_or(&self.0)
    }

    /// The branch name if this is a `refs/heads/` ref.
    pub fn branch(&self) -> Option<&str> {
        self.0.strip_prefix("refs/heads/")
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --------------------------------------------------------------------------
// Commit requests
// --------------------------------------------------------------------------

/// What a [`FileChange`] does to its path.
///
/// An empty `Present` is a valid zero-byte file; only `Deleted` removes the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// Write these bytes at the path (add or modify).
    Present(Vec<u8>),
    /// Remove the path from the tree.
    Deleted,
}

/// One file to add, modify, or delete in a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Destination path relative to the repository root, `/`-separated.
    pub path: String,
    /// New content, or the deletion marker.
    pub content: FileContent,
}

impl FileChange {
    /// Add or overwrite `path` with `content`.
    pub fn write(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: FileContent::Present(content.into()),
        }
    }

    /// Delete `path`.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: FileContent::Deleted,
        }
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self.content, FileContent::Deleted)
    }
}

// --------------------------------------------------------------------------
// Trees
// --------------------------------------------------------------------------

/// File mode of a tree entry, serialized in Git's octal notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMode {
    #[serde(rename = "100644")]
    File,
    #[serde(rename = "100755")]
    Executable,
    #[serde(rename = "120000")]
    Symlink,
    #[serde(rename = "040000")]
    Subtree,
    #[serde(rename = "160000")]
    Submodule,
}

impl EntryMode {
    /// The object kind an entry with this mode points at.
    pub fn kind(self) -> EntryKind {
        match self {
            EntryMode::File | EntryMode::Executable | EntryMode::Symlink => EntryKind::Blob,
            EntryMode::Subtree => EntryKind::Tree,
            EntryMode::Submodule => EntryKind::Commit,
        }
    }
}

/// Object type a tree entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    Commit,
}

/// One entry of a tree fetched from the hosting API.
///
/// In a recursive listing `path` is the full path from the root and nested
/// directories also appear as `Tree` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: EntryMode,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub sha: Sha,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn is_blob(&self) -> bool {
        self.kind == EntryKind::Blob
    }
}

/// A tree snapshot identified by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub sha: Sha,
    #[serde(rename = "tree")]
    pub entries: Vec<TreeEntry>,
    /// Set when the API cut a recursive listing short.
    #[serde(default)]
    pub truncated: bool,
}

/// Where a submitted tree entry's content comes from. Exactly one is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySource {
    /// Inline UTF-8 content; the API creates the blob.
    Content(String),
    /// An existing blob (or submodule commit).
    Sha(Sha),
}

/// One entry of a tree submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTreeEntry {
    pub path: String,
    pub mode: EntryMode,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(flatten)]
    pub source: EntrySource,
}

/// A tree submission: either a delta over `base_tree` or a complete listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_tree: Option<Sha>,
    pub tree: Vec<NewTreeEntry>,
}

// --------------------------------------------------------------------------
// Commits, references, repositories
// --------------------------------------------------------------------------

/// A commit submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCommit {
    pub message: String,
    pub tree: Sha,
    pub parents: Vec<Sha>,
}

/// A created or fetched commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub sha: Sha,
    pub tree: Sha,
    pub parents: Vec<Sha>,
    pub message: String,
}

/// A named pointer to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub name: RefName,
    pub sha: Sha,
}

/// Repository metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub default_branch: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// A branch and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub name: String,
    pub sha: Sha,
    pub protected: bool,
}

/// State of a commit status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Pending,
    Success,
    Failure,
    Error,
}

impl std::fmt::Display for StatusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusState::Pending => write!(f, "pending"),
            StatusState::Success => write!(f, "success"),
            StatusState::Failure => write!(f, "failure"),
            StatusState::Error => write!(f, "error"),
        }
    }
}

/// A status reported against a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    pub state: StatusState,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn accepts_nested_names() {
            assert!(BranchName::new("feature/deep/name").is_ok());
            assert!(BranchName::new("user@feature").is_ok());
        }

        #[test]
        fn rejects_git_invalid_names() {
            for bad in ["", "@", "-x", "a..b", "a//b", "x.lock", "x/", "a b", "a:b", "x/.y"] {
                assert!(BranchName::new(bad).is_err(), "should reject {bad:?}");
            }
        }
    }

    mod sha {
        use super::*;

        #[test]
        fn normalizes_to_lowercase() {
            let sha = Sha::new("ABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
            assert_eq!(sha.as_str(), "abcdef0123456789abcdef0123456789abcdef01");
        }

        #[test]
        fn accepts_sha256_length() {
            assert!(Sha::new("a".repeat(64)).is_ok());
        }

        #[test]
        fn rejects_wrong_length_and_non_hex() {
            assert!(Sha::new("abc").is_err());
            assert!(Sha::new("g".repeat(40)).is_err());
        }

        #[test]
        fn short_clamps_to_length() {
            let sha = Sha::new("a".repeat(40)).unwrap();
            assert_eq!(sha.short(100).len(), 40);
        }
    }

    mod ref_name {
        use super::*;

        #[test]
        fn for_branch_prefixes_heads() {
            let branch = BranchName::new("main").unwrap();
            assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/main");
        }

        #[test]
        fn parses_qualified_names() {
            let name = RefName::new("refs/heads/feature/x").unwrap();
            assert_eq!(name.branch(), Some("feature/x"));
            assert_eq!(name.without_namespace(), "heads/feature/x");

            let tag = RefName::new("refs/tags/v1.0").unwrap();
            assert_eq!(tag.branch(), None);
        }

        #[test]
        fn rejects_unqualified_names() {
            assert!(RefName::new("main").is_err());
            assert!(RefName::new("refs/heads").is_err());
            assert!(RefName::new("refs//main").is_err());
            assert!(RefName::new("refs/heads/bad..name").is_err());
        }
    }

    mod file_change {
        use super::*;

        #[test]
        fn empty_content_is_not_a_deletion() {
            let change = FileChange::write("empty.txt", "");
            assert!(!change.is_deletion());
            assert_eq!(change.content, FileContent::Present(Vec::new()));
        }

        #[test]
        fn delete_is_a_deletion() {
            assert!(FileChange::delete("gone.txt").is_deletion());
        }
    }

    mod serde_shapes {
        use super::*;
        use serde_json::json;

        fn sha(c: char) -> Sha {
            Sha::new(c.to_string().repeat(40)).unwrap()
        }

        #[test]
        fn new_tree_entry_carries_exactly_one_source() {
            let inline = NewTreeEntry {
                path: "a.txt".into(),
                mode: EntryMode::File,
                kind: EntryKind::Blob,
                source: EntrySource::Content("X".into()),
            };
            assert_eq!(
                serde_json::to_value(&inline).unwrap(),
                json!({"path": "a.txt", "mode": "100644", "type": "blob", "content": "X"})
            );

            let by_sha = NewTreeEntry {
                source: EntrySource::Sha(sha('c')),
                ..inline
            };
            let value = serde_json::to_value(&by_sha).unwrap();
            assert_eq!(value["sha"], json!("c".repeat(40)));
            assert!(value.get("content").is_none());
        }

        #[test]
        fn tree_request_omits_missing_base() {
            let request = TreeRequest {
                base_tree: None,
                tree: vec![],
            };
            assert_eq!(serde_json::to_value(&request).unwrap(), json!({"tree": []}));
        }

        #[test]
        fn tree_parses_api_listing() {
            let tree: Tree = serde_json::from_value(json!({
                "sha": "a".repeat(40),
                "url": "https://example.invalid",
                "tree": [
                    {"path": "docs", "mode": "040000", "type": "tree", "sha": "b".repeat(40)},
                    {"path": "docs/readme.md", "mode": "100644", "type": "blob", "sha": "c".repeat(40), "size": 12}
                ],
                "truncated": false
            }))
            .unwrap();

            assert_eq!(tree.entries.len(), 2);
            assert_eq!(tree.entries[0].kind, EntryKind::Tree);
            assert!(tree.entries[1].is_blob());
            assert_eq!(tree.entries[1].size, Some(12));
        }

        #[test]
        fn entry_mode_kind_mapping() {
            assert_eq!(EntryMode::File.kind(), EntryKind::Blob);
            assert_eq!(EntryMode::Executable.kind(), EntryKind::Blob);
            assert_eq!(EntryMode::Symlink.kind(), EntryKind::Blob);
            assert_eq!(EntryMode::Subtree.kind(), EntryKind::Tree);
            assert_eq!(EntryMode::Submodule.kind(), EntryKind::Commit);
        }

        #[test]
        fn status_state_display() {
            assert_eq!(StatusState::Success.to_string(), "success");
            assert_eq!(StatusState::Pending.to_string(), "pending");
        }
    }
}
