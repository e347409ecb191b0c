//! forge::traits
//!
//! Gateway trait definition for the hosting API's repository and Git Data
//! endpoints.
//!
//! # Design
//!
//! The `RepoGateway` trait is async because every operation is a network
//! call. Each operation takes an optional explicit bearer token; when it is
//! `None` the implementation asks its [`TokenProvider`](crate::auth::TokenProvider).
//! No authentication state is shared between calls.
//!
//! Read paths where absence is a normal outcome (repository lookup, content
//! lookup) return [`Lookup`] instead of failing with `NotFound`.
//!
//! # Example
//!
//! ```ignore
//! use hubcommit::forge::{Lookup, RepoGateway};
//!
//! async fn describe(gateway: &dyn RepoGateway) -> Result<(), GatewayError> {
//!     match gateway.get_repository("docs-site", None).await? {
//!         Lookup::Found(repo) => println!("default branch: {}", repo.default_branch),
//!         Lookup::NotFound => println!("no such repository"),
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::tree::{build_tree_request, PreparedChange};
use crate::auth::AuthError;
use crate::core::types::{
    Branch, BranchName, Commit, CommitStatus, EntrySource, FileChange, FileContent, NewCommit,
    RefName, Reference, Repository, Sha, Tree, TreeRequest,
};

/// Errors from gateway operations.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// No credential could be obtained for the call.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Creating a reference that already exists.
    #[error("reference already exists: {0}")]
    ReferenceConflict(RefName),

    /// Reading or updating a reference that does not exist.
    #[error("reference not found: {0}")]
    ReferenceNotFound(RefName),

    /// The API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message or body from the API
        message: String,
    },

    /// A recursive listing was cut short, so it cannot be used to rebuild a tree.
    #[error("tree {0} is too large to list recursively")]
    TruncatedTree(Sha),

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The request was rejected before reaching the network.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Network or connection error.
    #[error("network error: {0}")]
    Network(String),
}

impl GatewayError {
    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Api { status, .. } => Some(*status),
            GatewayError::NotFound(_) | GatewayError::ReferenceNotFound(_) => Some(404),
            GatewayError::ReferenceConflict(_) => Some(422),
            _ => None,
        }
    }
}

/// Result of a read where absence is an expected outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}

/// The gateway trait for the hosting API.
///
/// One method per remote concept. Implementations are stateless per call
/// apart from token acquisition.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, GatewayError>`. Callers should handle:
/// - `Auth`: the credential could not be obtained
/// - `NotFound`: resource doesn't exist (reads that model absence use [`Lookup`])
/// - `ReferenceConflict` / `ReferenceNotFound`: branch create/update mismatches
/// - `Api`: any other non-success response, with status and message
/// - `Network`: check connectivity
#[async_trait]
pub trait RepoGateway: Send + Sync {
    /// Get the gateway name (e.g., "github", "mock").
    fn name(&self) -> &'static str;

    /// Get repository metadata.
    async fn get_repository(
        &self,
        repo: &str,
        token: Option<&str>,
    ) -> Result<Lookup<Repository>, GatewayError>;

    /// Create a private, auto-initialized repository.
    async fn create_repository(
        &self,
        name: &str,
        token: Option<&str>,
    ) -> Result<Repository, GatewayError>;

    /// List branches.
    async fn list_branches(&self, repo: &str, token: Option<&str>)
        -> Result<Vec<Branch>, GatewayError>;

    /// Get one branch.
    async fn get_branch(
        &self,
        repo: &str,
        branch: &BranchName,
        token: Option<&str>,
    ) -> Result<Branch, GatewayError>;

    /// Get a reference by fully-qualified name.
    ///
    /// # Errors
    ///
    /// - `ReferenceNotFound` if the reference doesn't exist
    async fn get_reference(
        &self,
        repo: &str,
        name: &RefName,
        token: Option<&str>,
    ) -> Result<Reference, GatewayError>;

    /// Create a reference pointing at `sha`.
    ///
    /// # Errors
    ///
    /// - `ReferenceConflict` if the reference already exists
    async fn create_reference(
        &self,
        repo: &str,
        name: &RefName,
        sha: &Sha,
        token: Option<&str>,
    ) -> Result<Reference, GatewayError>;

    /// Move an existing reference to `sha`.
    ///
    /// Ancestry is not checked locally; the API's update semantics apply.
    ///
    /// # Errors
    ///
    /// - `ReferenceNotFound` if the reference doesn't exist
    async fn update_reference(
        &self,
        repo: &str,
        name: &RefName,
        sha: &Sha,
        token: Option<&str>,
    ) -> Result<Reference, GatewayError>;

    /// Get a tree by tree or commit id.
    ///
    /// With `recursive`, nested subtrees are flattened into one entry list
    /// with full paths.
    async fn get_tree(
        &self,
        repo: &str,
        sha: &Sha,
        recursive: bool,
        token: Option<&str>,
    ) -> Result<Tree, GatewayError>;

    /// Upload raw bytes as a blob.
    async fn create_blob(
        &self,
        repo: &str,
        content: &[u8],
        token: Option<&str>,
    ) -> Result<Sha, GatewayError>;

    /// Submit a tree.
    async fn create_tree(
        &self,
        repo: &str,
        request: &TreeRequest,
        token: Option<&str>,
    ) -> Result<Tree, GatewayError>;

    /// Create a commit object.
    async fn create_commit(
        &self,
        repo: &str,
        commit: &NewCommit,
        token: Option<&str>,
    ) -> Result<Commit, GatewayError>;

    /// Get raw file content, optionally at a branch.
    async fn get_content(
        &self,
        repo: &str,
        path: &str,
        branch: Option<&BranchName>,
        token: Option<&str>,
    ) -> Result<Lookup<Vec<u8>>, GatewayError>;

    /// List statuses reported for a commit.
    async fn list_commit_statuses(
        &self,
        repo: &str,
        sha: &Sha,
        token: Option<&str>,
    ) -> Result<Vec<CommitStatus>, GatewayError>;

    /// Create a tree applying `changes` to `base`.
    ///
    /// Without deletions the request is a delta over `base`. With deletions
    /// the tree is rebuilt from `base`, which must then be a recursive
    /// listing. Content that is not UTF-8 is uploaded as a blob first.
    ///
    /// Paths in `changes` are expected to be distinct; collapse repeats with
    /// [`dedupe_changes`](super::tree::dedupe_changes) first.
    async fn create_tree_with_changes(
        &self,
        repo: &str,
        base: &Tree,
        changes: &[FileChange],
        token: Option<&str>,
    ) -> Result<Tree, GatewayError> {
        let mut prepared = Vec::with_capacity(changes.len());
        for change in changes {
            let source = match &change.content {
                FileContent::Deleted => None,
                FileContent::Present(bytes) => match std::str::from_utf8(bytes) {
                    Ok(text) => Some(EntrySource::Content(text.to_string())),
                    Err(_) => {
                        debug!(path = %change.path, size = bytes.len(), "uploading binary blob");
                        Some(EntrySource::Sha(self.create_blob(repo, bytes, token).await?))
                    }
                },
            };
            prepared.push(PreparedChange {
                path: change.path.clone(),
                source,
            });
        }

        let request = build_tree_request(base, &prepared)?;
        self.create_tree(repo, &request, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_conversions() {
        let found: Lookup<u8> = Some(3).into();
        assert!(found.is_found());
        assert_eq!(found.clone().map(|v| v * 2), Lookup::Found(6));
        assert_eq!(found.into_option(), Some(3));

        let missing: Lookup<u8> = None.into();
        assert!(!missing.is_found());
        assert_eq!(missing.into_option(), None);
    }

    #[test]
    fn gateway_error_display() {
        let name = RefName::new("refs/heads/feature").unwrap();
        assert_eq!(
            GatewayError::ReferenceConflict(name.clone()).to_string(),
            "reference already exists: refs/heads/feature"
        );
        assert_eq!(
            GatewayError::ReferenceNotFound(name).to_string(),
            "reference not found: refs/heads/feature"
        );
        assert_eq!(
            GatewayError::Api {
                status: 422,
                message: "Validation failed".into()
            }
            .to_string(),
            "API error: 422 - Validation failed"
        );
        assert_eq!(
            GatewayError::NotFound("repository 'x'".into()).to_string(),
            "not found: repository 'x'"
        );
    }

    #[test]
    fn auth_errors_convert() {
        let err: GatewayError = AuthError::Network("refused".into()).into();
        assert!(matches!(err, GatewayError::Auth(_)));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn status_mapping() {
        let name = RefName::new("refs/heads/x").unwrap();
        assert_eq!(GatewayError::ReferenceConflict(name.clone()).status(), Some(422));
        assert_eq!(GatewayError::ReferenceNotFound(name).status(), Some(404));
        assert_eq!(GatewayError::Network("x".into()).status(), None);
    }
}
