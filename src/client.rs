//! client
//!
//! The public operation surface: repository queries and the commit-and-push
//! orchestration.
//!
//! # Commit and push
//!
//! [`RepoClient::create_commit_and_push`] turns a list of file changes into
//! one commit:
//!
//! 1. Resolve the repository's default branch and its tip. The new commit is
//!    always parented on the default branch tip, also when pushing to
//!    another existing branch.
//! 2. Fetch the tip's tree, recursively if any change deletes a path.
//! 3. Create the new tree (incremental without deletions, reconstructed
//!    with them).
//! 4. Create the commit.
//! 5. Create `refs/heads/<branch>` for a new branch, otherwise update it.
//!
//! Steps run strictly in sequence and nothing is rolled back: a failure
//! after step 3 leaves unreferenced objects on the remote, which is harmless.
//!
//! # Example
//!
//! ```ignore
//! use hubcommit::client::{PushRequest, RepoClient};
//! use hubcommit::core::types::{BranchName, FileChange};
//!
//! let client = RepoClient::from_config(&config)?;
//! let request = PushRequest::new("docs-site", BranchName::new("main")?, "Update guides")
//!     .change(FileChange::write("guides/intro.md", "# Intro\n"))
//!     .change(FileChange::delete("guides/old.md"));
//! let commit = client.create_commit_and_push(&request).await?;
//! ```

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::core::config::AppConfig;
use crate::core::listing::file_names_under;
use crate::core::types::{
    Branch, BranchName, Commit, CommitStatus, FileChange, NewCommit, RefName, Repository, Sha,
    Tree,
};
use crate::forge::github::GitHubGateway;
use crate::forge::tree::{dedupe_changes, has_deletions};
use crate::forge::{GatewayError, RepoGateway};

/// A "push these changes as one commit" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRequest {
    pub repository: String,
    pub branch: BranchName,
    pub changes: Vec<FileChange>,
    pub message: String,
    /// Create the branch instead of updating it.
    pub new_branch: bool,
}

impl PushRequest {
    pub fn new(
        repository: impl Into<String>,
        branch: BranchName,
        message: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            branch,
            changes: Vec::new(),
            message: message.into(),
            new_branch: false,
        }
    }

    pub fn change(mut self, change: FileChange) -> Self {
        self.changes.push(change);
        self
    }

    pub fn changes(mut self, changes: impl IntoIterator<Item = FileChange>) -> Self {
        self.changes.extend(changes);
        self
    }

    /// Mark the target branch as one to create.
    pub fn creating_branch(mut self, new_branch: bool) -> Self {
        self.new_branch = new_branch;
        self
    }
}

/// Client for one gateway, optionally pinned to an explicit token.
///
/// Cloning is cheap; clones share the gateway (and its token cache) but not
/// the explicit token.
#[derive(Clone)]
pub struct RepoClient {
    gateway: Arc<dyn RepoGateway>,
    token: Option<String>,
}

// Custom Debug to avoid exposing the explicit token
impl std::fmt::Debug for RepoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoClient")
            .field("gateway", &self.gateway.name())
            .field("has_explicit_token", &self.token.is_some())
            .finish()
    }
}

impl RepoClient {
    pub fn new(gateway: Arc<dyn RepoGateway>) -> Self {
        Self {
            gateway,
            token: None,
        }
    }

    /// Create a client for the GitHub API authenticated as the configured app.
    pub fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
        Ok(Self::new(Arc::new(GitHubGateway::from_config(config)?)))
    }

    /// A client that sends `token` with every call instead of asking the
    /// gateway's provider.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            token: Some(token.into()),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn RepoGateway> {
        &self.gateway
    }

    fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Repository metadata, or `None` if the repository does not exist.
    pub async fn get_repository(&self, repo: &str) -> Result<Option<Repository>, GatewayError> {
        Ok(self
            .gateway
            .get_repository(repo, self.token())
            .await?
            .into_option())
    }

    /// Name of the repository's default branch.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the repository does not exist
    /// - `Decode` if the reported name is not a valid branch name
    pub async fn get_default_branch(&self, repo: &str) -> Result<BranchName, GatewayError> {
        let repository = self
            .get_repository(repo)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("repository '{}'", repo)))?;
        BranchName::new(repository.default_branch).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    /// Push `request.changes` to `request.branch` as a single commit.
    ///
    /// Repeated paths collapse to their last occurrence. An empty change
    /// list produces a commit with the base tree unchanged.
    ///
    /// # Errors
    ///
    /// - `ReferenceConflict` if `new_branch` is set and the branch exists
    /// - `ReferenceNotFound` if `new_branch` is unset and the branch does not exist
    /// - `TruncatedTree` if deletions require a full listing the API cut short
    /// - any error from an individual step, unchanged
    #[instrument(
        skip(self, request),
        fields(
            repo = %request.repository,
            branch = %request.branch,
            changes = request.changes.len(),
            new_branch = request.new_branch,
        )
    )]
    pub async fn create_commit_and_push(&self, request: &PushRequest) -> Result<Commit, GatewayError> {
        let repo = request.repository.as_str();
        let token = self.token();

        let default_branch = self.get_default_branch(repo).await?;
        let base = self
            .gateway
            .get_reference(repo, &RefName::for_branch(&default_branch), token)
            .await?;
        let parent = base.sha;
        debug!(default_branch = %default_branch, parent = %parent.short(7), "resolved base commit");

        let changes = dedupe_changes(&request.changes);
        if changes.len() < request.changes.len() {
            warn!(
                duplicates = request.changes.len() - changes.len(),
                "repeated paths collapsed to their last change"
            );
        }
        let reconstruct = has_deletions(&changes);
        let base_tree = self.gateway.get_tree(repo, &parent, reconstruct, token).await?;
        debug!(
            base_tree = %base_tree.sha.short(7),
            mode = if reconstruct { "reconstructed" } else { "incremental" },
            "fetched base tree"
        );

        let tree = self
            .gateway
            .create_tree_with_changes(repo, &base_tree, &changes, token)
            .await?;
        debug!(tree = %tree.sha.short(7), "created tree");

        let commit = self
            .gateway
            .create_commit(
                repo,
                &NewCommit {
                    message: request.message.clone(),
                    tree: tree.sha,
                    parents: vec![parent],
                },
                token,
            )
            .await?;
        debug!(commit = %commit.sha.short(7), "created commit");

        let name = RefName::for_branch(&request.branch);
        if request.new_branch {
            self.gateway
                .create_reference(repo, &name, &commit.sha, token)
                .await?;
        } else {
            self.gateway
                .update_reference(repo, &name, &commit.sha, token)
                .await?;
        }

        info!(commit = %commit.sha.short(7), "pushed {} change(s)", changes.len());
        Ok(commit)
    }

    /// Statuses reported for a commit.
    pub async fn get_commit_statuses(
        &self,
        repo: &str,
        sha: &Sha,
    ) -> Result<Vec<CommitStatus>, GatewayError> {
        self.gateway.list_commit_statuses(repo, sha, self.token()).await
    }

    /// Raw file content, or `None` if the file (or repository) does not exist.
    pub async fn get_file_bytes(
        &self,
        repo: &str,
        path: &str,
        branch: Option<&BranchName>,
    ) -> Result<Option<Vec<u8>>, GatewayError> {
        Ok(self
            .gateway
            .get_content(repo, path, branch, self.token())
            .await?
            .into_option())
    }

    /// File content as text, or `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the content is not UTF-8.
    pub async fn get_file_content(
        &self,
        repo: &str,
        path: &str,
        branch: Option<&BranchName>,
    ) -> Result<Option<String>, GatewayError> {
        self.get_file_bytes(repo, path, branch)
            .await?
            .map(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|_| GatewayError::Decode(format!("'{}' is not UTF-8 text", path)))
            })
            .transpose()
    }

    pub async fn list_branches(&self, repo: &str) -> Result<Vec<Branch>, GatewayError> {
        self.gateway.list_branches(repo, self.token()).await
    }

    pub async fn get_branch(&self, repo: &str, branch: &BranchName) -> Result<Branch, GatewayError> {
        self.gateway.get_branch(repo, branch, self.token()).await
    }

    /// Create a private repository initialized with a first commit.
    pub async fn create_repository(&self, name: &str) -> Result<Repository, GatewayError> {
        self.gateway.create_repository(name, self.token()).await
    }

    /// A tree by tree or commit id.
    pub async fn get_tree(
        &self,
        repo: &str,
        sha: &Sha,
        recursive: bool,
    ) -> Result<Tree, GatewayError> {
        self.gateway.get_tree(repo, sha, recursive, self.token()).await
    }

    /// Names of files directly inside `path` on `branch`.
    ///
    /// `"/"`, `"."` and `"./"` denote the repository root. No match yields
    /// an empty list.
    #[instrument(skip(self))]
    pub async fn list_file_names(
        &self,
        repo: &str,
        branch: &BranchName,
        path: &str,
    ) -> Result<Vec<String>, GatewayError> {
        let token = self.token();
        let head = self
            .gateway
            .get_reference(repo, &RefName::for_branch(branch), token)
            .await?;
        let tree = self.gateway.get_tree(repo, &head.sha, true, token).await?;
        if tree.truncated {
            warn!("listing is based on a truncated tree and may be incomplete");
        }
        Ok(file_names_under(&tree, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::MockGateway;

    fn client(gateway: &MockGateway) -> RepoClient {
        RepoClient::new(Arc::new(gateway.clone()))
    }

    #[test]
    fn push_request_builder() {
        let request = PushRequest::new("docs", BranchName::new("main").unwrap(), "msg")
            .change(FileChange::write("a", "1"))
            .changes([FileChange::delete("b")])
            .creating_branch(true);
        assert_eq!(request.changes.len(), 2);
        assert!(request.new_branch);
    }

    #[test]
    fn debug_hides_explicit_token() {
        let client = client(&MockGateway::new()).with_token("ghs_secret");
        let output = format!("{:?}", client);
        assert!(!output.contains("ghs_secret"));
        assert!(output.contains("has_explicit_token: true"));
    }

    #[tokio::test]
    async fn explicit_token_reaches_every_gateway_call() {
        let gateway = MockGateway::new().with_repository("docs", "main", [("a.md", "a")]);
        let client = client(&gateway).with_token("ghs_explicit");

        client
            .create_commit_and_push(
                &PushRequest::new("docs", BranchName::new("main").unwrap(), "m")
                    .change(FileChange::write("b.md", "b")),
            )
            .await
            .unwrap();

        let tokens = gateway.tokens();
        assert!(!tokens.is_empty());
        assert!(tokens
            .iter()
            .all(|t| t.as_deref() == Some("ghs_explicit")));
    }

    #[tokio::test]
    async fn default_branch_of_missing_repository_is_not_found() {
        let client = client(&MockGateway::new());
        let err = client.get_default_branch("nope").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn binary_content_is_not_text() {
        let gateway = MockGateway::new().with_repository(
            "docs",
            "main",
            [("logo.png", vec![0x89u8, 0x50, 0xff])],
        );
        let client = client(&gateway);

        let bytes = client.get_file_bytes("docs", "logo.png", None).await.unwrap();
        assert_eq!(bytes, Some(vec![0x89, 0x50, 0xff]));

        let err = client
            .get_file_content("docs", "logo.png", None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }
}
