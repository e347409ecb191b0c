//! forge::mock
//!
//! In-memory gateway for deterministic testing.
//!
//! # Design
//!
//! The mock gateway keeps a small content-addressed object store (blobs,
//! trees, commits) plus per-repository references, and applies the same
//! request semantics the hosting API does for the operations the client
//! uses: incremental trees compose over `base_tree`, reference creation
//! conflicts on existing names, and reference updates must fast-forward.
//!
//! Object ids are derived from SHA-256 digests of the object contents,
//! truncated to 40 hex characters, so equal content yields equal ids.
//!
//! Failures can be injected per operation with [`FailOn`], and every call is
//! recorded as a [`MockOperation`] for verification.
//!
//! # Example
//!
//! ```
//! use hubcommit::forge::mock::MockGateway;
//! use hubcommit::forge::{Lookup, RepoGateway};
//!
//! # tokio_test::block_on(async {
//! let gateway = MockGateway::new().with_repository("docs", "main", [("README.md", "# docs")]);
//!
//! let repo = gateway.get_repository("docs", None).await.unwrap();
//! assert!(repo.is_found());
//! assert_eq!(gateway.files_at("docs", "main").unwrap().len(), 1);
//! # });
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::traits::{GatewayError, Lookup, RepoGateway};
use crate::core::types::{
    Branch, BranchName, Commit, CommitStatus, EntryKind, EntryMode, EntrySource, NewCommit,
    RefName, Reference, Repository, Sha, Tree, TreeEntry, TreeRequest,
};

/// Owner reported in mock repository names.
const MOCK_OWNER: &str = "mock";

/// Mock gateway for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockGateway {
    inner: Arc<Mutex<MockGatewayInner>>,
}

/// A non-directory tree entry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileRecord {
    mode: EntryMode,
    sha: Sha,
}

#[derive(Debug, Clone)]
struct StoredTree {
    /// Every non-directory entry below this tree, by path relative to it.
    files: BTreeMap<String, FileRecord>,
    /// Immediate subdirectories.
    dirs: BTreeMap<String, Sha>,
}

#[derive(Debug)]
struct MockRepository {
    repository: Repository,
    /// Fully-qualified ref name -> commit.
    refs: BTreeMap<String, Sha>,
    statuses: HashMap<Sha, Vec<CommitStatus>>,
}

#[derive(Debug, Default)]
struct MockGatewayInner {
    repositories: BTreeMap<String, MockRepository>,
    blobs: HashMap<Sha, Vec<u8>>,
    trees: HashMap<Sha, StoredTree>,
    commits: HashMap<Sha, Commit>,
    /// Mixed into commit ids so identical commits stay distinct.
    commit_sequence: u64,
    /// Report recursive listings as truncated.
    truncate_listings: bool,
    fail_on: Option<FailOn>,
    operations: Vec<MockOperation>,
    tokens: Vec<Option<String>>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    GetRepository(GatewayError),
    CreateRepository(GatewayError),
    ListBranches(GatewayError),
    GetBranch(GatewayError),
    GetReference(GatewayError),
    CreateReference(GatewayError),
    UpdateReference(GatewayError),
    GetTree(GatewayError),
    CreateBlob(GatewayError),
    CreateTree(GatewayError),
    CreateCommit(GatewayError),
    GetContent(GatewayError),
    ListCommitStatuses(GatewayError),
}

impl FailOn {
    fn operation(&self) -> &'static str {
        match self {
            FailOn::GetRepository(_) => "get_repository",
            FailOn::CreateRepository(_) => "create_repository",
            FailOn::ListBranches(_) => "list_branches",
            FailOn::GetBranch(_) => "get_branch",
            FailOn::GetReference(_) => "get_reference",
            FailOn::CreateReference(_) => "create_reference",
            FailOn::UpdateReference(_) => "update_reference",
            FailOn::GetTree(_) => "get_tree",
            FailOn::CreateBlob(_) => "create_blob",
            FailOn::CreateTree(_) => "create_tree",
            FailOn::CreateCommit(_) => "create_commit",
            FailOn::GetContent(_) => "get_content",
            FailOn::ListCommitStatuses(_) => "list_commit_statuses",
        }
    }

    fn error(&self) -> GatewayError {
        match self {
            FailOn::GetRepository(e)
            | FailOn::CreateRepository(e)
            | FailOn::ListBranches(e)
            | FailOn::GetBranch(e)
            | FailOn::GetReference(e)
            | FailOn::CreateReference(e)
            | FailOn::UpdateReference(e)
            | FailOn::GetTree(e)
            | FailOn::CreateBlob(e)
            | FailOn::CreateTree(e)
            | FailOn::CreateCommit(e)
            | FailOn::GetContent(e)
            | FailOn::ListCommitStatuses(e) => e.clone(),
        }
    }
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    GetRepository {
        repo: String,
    },
    CreateRepository {
        name: String,
    },
    ListBranches {
        repo: String,
    },
    GetBranch {
        repo: String,
        branch: String,
    },
    GetReference {
        repo: String,
        name: String,
    },
    CreateReference {
        repo: String,
        name: String,
        sha: Sha,
    },
    UpdateReference {
        repo: String,
        name: String,
        sha: Sha,
    },
    GetTree {
        repo: String,
        sha: Sha,
        recursive: bool,
    },
    CreateBlob {
        repo: String,
        size: usize,
    },
    CreateTree {
        repo: String,
        request: TreeRequest,
    },
    CreateCommit {
        repo: String,
        commit: NewCommit,
    },
    GetContent {
        repo: String,
        path: String,
        branch: Option<String>,
    },
    ListCommitStatuses {
        repo: String,
        sha: Sha,
    },
}

impl MockOperation {
    /// Name of the gateway method this operation records.
    pub fn name(&self) -> &'static str {
        match self {
            MockOperation::GetRepository { .. } => "get_repository",
            MockOperation::CreateRepository { .. } => "create_repository",
            MockOperation::ListBranches { .. } => "list_branches",
            MockOperation::GetBranch { .. } => "get_branch",
            MockOperation::GetReference { .. } => "get_reference",
            MockOperation::CreateReference { .. } => "create_reference",
            MockOperation::UpdateReference { .. } => "update_reference",
            MockOperation::GetTree { .. } => "get_tree",
            MockOperation::CreateBlob { .. } => "create_blob",
            MockOperation::CreateTree { .. } => "create_tree",
            MockOperation::CreateCommit { .. } => "create_commit",
            MockOperation::GetContent { .. } => "get_content",
            MockOperation::ListCommitStatuses { .. } => "list_commit_statuses",
        }
    }
}

/// Derive an object id from a kind tag and contents.
fn object_id(kind: &str, data: &[u8]) -> Sha {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    hasher.update(data);
    let digest = hex::encode(hasher.finalize());
    Sha::new(&digest[..40]).expect("hex digest prefix is a valid object id")
}

fn unprocessable(message: impl Into<String>) -> GatewayError {
    GatewayError::Api {
        status: 422,
        message: message.into(),
    }
}

fn repository_not_found(repo: &str) -> GatewayError {
    GatewayError::NotFound(format!("repository '{}'", repo))
}

/// Reject paths the API would refuse: empty, absolute, or with empty components.
fn validate_path(path: &str) -> Result<(), GatewayError> {
    if path.is_empty() || path.split('/').any(|component| component.is_empty()) {
        return Err(unprocessable(format!("invalid tree entry path '{}'", path)));
    }
    Ok(())
}

/// Remove whatever currently occupies `path`: the entry itself, anything
/// below it, and any file standing where one of its parent directories goes.
fn clear_path(files: &mut BTreeMap<String, FileRecord>, path: &str) {
    files.remove(path);
    let prefix = format!("{}/", path);
    files.retain(|existing, _| !existing.starts_with(&prefix));
    for (index, _) in path.match_indices('/') {
        files.remove(&path[..index]);
    }
}

enum Child<'a> {
    File(&'a FileRecord),
    Dir(&'a Sha),
}

impl MockGatewayInner {
    fn repo(&self, name: &str) -> Result<&MockRepository, GatewayError> {
        self.repositories
            .get(name)
            .ok_or_else(|| repository_not_found(name))
    }

    fn repo_mut(&mut self, name: &str) -> Result<&mut MockRepository, GatewayError> {
        self.repositories
            .get_mut(name)
            .ok_or_else(|| repository_not_found(name))
    }

    fn store_blob(&mut self, content: &[u8]) -> Sha {
        let id = object_id("blob", content);
        self.blobs.entry(id.clone()).or_insert_with(|| content.to_vec());
        id
    }

    fn store_tree(&mut self, files: BTreeMap<String, FileRecord>) -> Sha {
        let mut groups: BTreeMap<String, BTreeMap<String, FileRecord>> = BTreeMap::new();
        let mut listing = String::new();

        for (path, record) in &files {
            match path.split_once('/') {
                Some((dir, rest)) => {
                    groups
                        .entry(dir.to_string())
                        .or_default()
                        .insert(rest.to_string(), record.clone());
                }
                None => listing.push_str(&format!("{:?} {} {}\n", record.mode, path, record.sha)),
            }
        }

        let mut dirs = BTreeMap::new();
        for (dir, sub) in groups {
            let id = self.store_tree(sub);
            listing.push_str(&format!("{:?} {} {}\n", EntryMode::Subtree, dir, id));
            dirs.insert(dir, id);
        }

        let id = object_id("tree", listing.as_bytes());
        self.trees
            .entry(id.clone())
            .or_insert(StoredTree { files, dirs });
        id
    }

    fn store_commit(&mut self, tree: Sha, parents: Vec<Sha>, message: &str) -> Commit {
        self.commit_sequence += 1;
        let parent_ids: Vec<&str> = parents.iter().map(Sha::as_str).collect();
        let body = format!(
            "tree {}\nparents {}\nsequence {}\n\n{}",
            tree,
            parent_ids.join(" "),
            self.commit_sequence,
            message
        );
        let commit = Commit {
            sha: object_id("commit", body.as_bytes()),
            tree,
            parents,
            message: message.to_string(),
        };
        self.commits.insert(commit.sha.clone(), commit.clone());
        commit
    }

    /// Accept a tree id or a commit id and return the tree id.
    fn resolve_tree(&self, sha: &Sha) -> Option<Sha> {
        if self.trees.contains_key(sha) {
            return Some(sha.clone());
        }
        self.commits.get(sha).map(|commit| commit.tree.clone())
    }

    fn list_tree(&self, id: &Sha, prefix: &str, recursive: bool, out: &mut Vec<TreeEntry>) {
        let Some(stored) = self.trees.get(id) else {
            return;
        };

        let files = stored
            .files
            .iter()
            .filter(|(path, _)| !path.contains('/'))
            .map(|(name, record)| (name.as_str(), Child::File(record)));
        let dirs = stored
            .dirs
            .iter()
            .map(|(name, sub)| (name.as_str(), Child::Dir(sub)));
        let mut children: Vec<(&str, Child)> = files.chain(dirs).collect();
        children.sort_by(|a, b| a.0.cmp(b.0));

        for (name, child) in children {
            let path = format!("{}{}", prefix, name);
            match child {
                Child::File(record) => out.push(TreeEntry {
                    path,
                    mode: record.mode,
                    kind: record.mode.kind(),
                    sha: record.sha.clone(),
                    size: self.blobs.get(&record.sha).map(|b| b.len() as u64),
                }),
                Child::Dir(sub) => {
                    out.push(TreeEntry {
                        path: path.clone(),
                        mode: EntryMode::Subtree,
                        kind: EntryKind::Tree,
                        sha: sub.clone(),
                        size: None,
                    });
                    if recursive {
                        self.list_tree(sub, &format!("{}/", path), true, out);
                    }
                }
            }
        }
    }

    fn tree_view(&self, id: &Sha, recursive: bool) -> Tree {
        let mut entries = Vec::new();
        self.list_tree(id, "", recursive, &mut entries);
        Tree {
            sha: id.clone(),
            entries,
            truncated: recursive && self.truncate_listings,
        }
    }

    /// Whether `ancestor` is `descendant` or reachable through its parents.
    fn is_ancestor(&self, ancestor: &Sha, descendant: &Sha) -> bool {
        let mut pending = vec![descendant.clone()];
        while let Some(sha) = pending.pop() {
            if &sha == ancestor {
                return true;
            }
            if let Some(commit) = self.commits.get(&sha) {
                pending.extend(commit.parents.iter().cloned());
            }
        }
        false
    }

    fn branch_tip(&self, repo: &str, branch: &str) -> Option<Sha> {
        self.repositories
            .get(repo)?
            .refs
            .get(&format!("refs/heads/{}", branch))
            .cloned()
    }

    fn files_of_commit(&self, sha: &Sha) -> Option<BTreeMap<String, Vec<u8>>> {
        let tree = self.resolve_tree(sha)?;
        let stored = self.trees.get(&tree)?;
        Some(
            stored
                .files
                .iter()
                .filter_map(|(path, record)| {
                    let content = self.blobs.get(&record.sha)?;
                    Some((path.clone(), content.clone()))
                })
                .collect(),
        )
    }

    /// Commit `files` (written over the current tree) on top of `branch`.
    fn write_commit(
        &mut self,
        repo: &str,
        branch: &str,
        files: Vec<(String, Vec<u8>)>,
        message: &str,
    ) -> Result<Sha, GatewayError> {
        let tip = self.branch_tip(repo, branch);
        let mut tree_files = match &tip {
            Some(tip) => self
                .resolve_tree(tip)
                .and_then(|tree| self.trees.get(&tree))
                .map(|stored| stored.files.clone())
                .unwrap_or_default(),
            None => BTreeMap::new(),
        };
        for (path, content) in files {
            validate_path(&path)?;
            let sha = self.store_blob(&content);
            clear_path(&mut tree_files, &path);
            tree_files.insert(
                path,
                FileRecord {
                    mode: EntryMode::File,
                    sha,
                },
            );
        }

        let tree = self.store_tree(tree_files);
        let commit = self.store_commit(tree, tip.into_iter().collect(), message);
        self.repo_mut(repo)?
            .refs
            .insert(format!("refs/heads/{}", branch), commit.sha.clone());
        Ok(commit.sha)
    }

    fn insert_repository(&mut self, name: &str, default_branch: &str) {
        self.repositories.insert(
            name.to_string(),
            MockRepository {
                repository: Repository {
                    name: name.to_string(),
                    full_name: format!("{}/{}", MOCK_OWNER, name),
                    default_branch: default_branch.to_string(),
                    private: true,
                    html_url: Some(format!("https://github.com/{}/{}", MOCK_OWNER, name)),
                },
                refs: BTreeMap::new(),
                statuses: HashMap::new(),
            },
        );
    }
}

impl MockGateway {
    /// Create a new empty mock gateway.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockGatewayInner::default())),
        }
    }

    /// Add a repository whose default branch holds one commit with `files`.
    pub fn with_repository<I, P, C>(self, name: &str, default_branch: &str, files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<Vec<u8>>,
    {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.insert_repository(name, default_branch);
            let files = files
                .into_iter()
                .map(|(path, content)| (path.into(), content.into()))
                .collect();
            inner
                .write_commit(name, default_branch, files, "Initial commit")
                .expect("seed files have valid paths");
        }
        self
    }

    /// Add a branch pointing at the current tip of the default branch.
    pub fn with_branch(self, repo: &str, branch: &str) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            let repository = inner.repositories.get(repo).expect("repository was seeded");
            let default_branch = repository.repository.default_branch.clone();
            let tip = inner
                .branch_tip(repo, &default_branch)
                .expect("default branch was seeded");
            inner
                .repositories
                .get_mut(repo)
                .expect("repository was seeded")
                .refs
                .insert(format!("refs/heads/{}", branch), tip);
        }
        self
    }

    /// Configure the mock to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fail_on = Some(fail_on);
        }
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = None;
    }

    /// Report every recursive listing as truncated.
    pub fn set_truncated_listings(&self, truncated: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.truncate_listings = truncated;
    }

    /// Advance `branch` with a commit writing `files` over its current tree.
    ///
    /// Simulates someone else pushing between client calls.
    pub fn push_files<I, P, C>(&self, repo: &str, branch: &str, files: I, message: &str) -> Sha
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<Vec<u8>>,
    {
        let mut inner = self.inner.lock().unwrap();
        let files = files
            .into_iter()
            .map(|(path, content)| (path.into(), content.into()))
            .collect();
        inner
            .write_commit(repo, branch, files, message)
            .expect("repository was seeded and paths are valid")
    }

    /// Set the statuses reported for a commit.
    pub fn set_statuses(&self, repo: &str, sha: &Sha, statuses: Vec<CommitStatus>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(repository) = inner.repositories.get_mut(repo) {
            repository.statuses.insert(sha.clone(), statuses);
        }
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        let inner = self.inner.lock().unwrap();
        inner.operations.clone()
    }

    /// Names of recorded operations, in call order.
    pub fn operation_names(&self) -> Vec<&'static str> {
        let inner = self.inner.lock().unwrap();
        inner.operations.iter().map(MockOperation::name).collect()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.clear();
        inner.tokens.clear();
    }

    /// Explicit tokens passed with each recorded operation.
    pub fn tokens(&self) -> Vec<Option<String>> {
        let inner = self.inner.lock().unwrap();
        inner.tokens.clone()
    }

    /// Commit a branch currently points at.
    pub fn head(&self, repo: &str, branch: &str) -> Option<Sha> {
        let inner = self.inner.lock().unwrap();
        inner.branch_tip(repo, branch)
    }

    /// A stored commit.
    pub fn commit(&self, sha: &Sha) -> Option<Commit> {
        let inner = self.inner.lock().unwrap();
        inner.commits.get(sha).cloned()
    }

    /// Every file (path -> content) of a commit or tree.
    pub fn files_of(&self, sha: &Sha) -> Option<BTreeMap<String, Vec<u8>>> {
        let inner = self.inner.lock().unwrap();
        inner.files_of_commit(sha)
    }

    /// Every file (path -> content) at the tip of a branch.
    pub fn files_at(&self, repo: &str, branch: &str) -> Option<BTreeMap<String, Vec<u8>>> {
        let inner = self.inner.lock().unwrap();
        let tip = inner.branch_tip(repo, branch)?;
        inner.files_of_commit(&tip)
    }

    /// Mode of one file at the tip of a branch.
    pub fn mode_at(&self, repo: &str, branch: &str, path: &str) -> Option<EntryMode> {
        let inner = self.inner.lock().unwrap();
        let tip = inner.branch_tip(repo, branch)?;
        let tree = inner.resolve_tree(&tip)?;
        inner.trees.get(&tree)?.files.get(path).map(|r| r.mode)
    }

    /// Record an operation and the token it carried.
    fn record(&self, op: MockOperation, token: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(op);
        inner.tokens.push(token.map(str::to_string));
    }

    /// Check if we should fail and return the error if so.
    fn check_fail(&self, operation: &str) -> Result<(), GatewayError> {
        let inner = self.inner.lock().unwrap();
        match &inner.fail_on {
            Some(fail_on) if fail_on.operation() == operation => Err(fail_on.error()),
            _ => Ok(()),
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RepoGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_repository(
        &self,
        repo: &str,
        token: Option<&str>,
    ) -> Result<Lookup<Repository>, GatewayError> {
        self.record(
            MockOperation::GetRepository {
                repo: repo.to_string(),
            },
            token,
        );
        self.check_fail("get_repository")?;

        let inner = self.inner.lock().unwrap();
        Ok(inner
            .repositories
            .get(repo)
            .map(|r| r.repository.clone())
            .into())
    }

    async fn create_repository(
        &self,
        name: &str,
        token: Option<&str>,
    ) -> Result<Repository, GatewayError> {
        self.record(
            MockOperation::CreateRepository {
                name: name.to_string(),
            },
            token,
        );
        self.check_fail("create_repository")?;

        let mut inner = self.inner.lock().unwrap();
        if inner.repositories.contains_key(name) {
            return Err(unprocessable(
                "Repository creation failed: name already exists on this account",
            ));
        }
        inner.insert_repository(name, "main");
        let readme = format!("# {}\n", name).into_bytes();
        inner.write_commit(name, "main", vec![("README.md".to_string(), readme)], "Initial commit")?;
        Ok(inner.repo(name)?.repository.clone())
    }

    async fn list_branches(
        &self,
        repo: &str,
        token: Option<&str>,
    ) -> Result<Vec<Branch>, GatewayError> {
        self.record(
            MockOperation::ListBranches {
                repo: repo.to_string(),
            },
            token,
        );
        self.check_fail("list_branches")?;

        let inner = self.inner.lock().unwrap();
        Ok(inner
            .repo(repo)?
            .refs
            .iter()
            .filter_map(|(name, sha)| {
                Some(Branch {
                    name: name.strip_prefix("refs/heads/")?.to_string(),
                    sha: sha.clone(),
                    protected: false,
                })
            })
            .collect())
    }

    async fn get_branch(
        &self,
        repo: &str,
        branch: &BranchName,
        token: Option<&str>,
    ) -> Result<Branch, GatewayError> {
        self.record(
            MockOperation::GetBranch {
                repo: repo.to_string(),
                branch: branch.to_string(),
            },
            token,
        );
        self.check_fail("get_branch")?;

        let inner = self.inner.lock().unwrap();
        inner.repo(repo)?;
        let sha = inner
            .branch_tip(repo, branch.as_str())
            .ok_or_else(|| GatewayError::NotFound(format!("branch '{}'", branch)))?;
        Ok(Branch {
            name: branch.to_string(),
            sha,
            protected: false,
        })
    }

    async fn get_reference(
        &self,
        repo: &str,
        name: &RefName,
        token: Option<&str>,
    ) -> Result<Reference, GatewayError> {
        self.record(
            MockOperation::GetReference {
                repo: repo.to_string(),
                name: name.to_string(),
            },
            token,
        );
        self.check_fail("get_reference")?;

        let inner = self.inner.lock().unwrap();
        let sha = inner
            .repo(repo)?
            .refs
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| GatewayError::ReferenceNotFound(name.clone()))?;
        Ok(Reference {
            name: name.clone(),
            sha,
        })
    }

    async fn create_reference(
        &self,
        repo: &str,
        name: &RefName,
        sha: &Sha,
        token: Option<&str>,
    ) -> Result<Reference, GatewayError> {
        self.record(
            MockOperation::CreateReference {
                repo: repo.to_string(),
                name: name.to_string(),
                sha: sha.clone(),
            },
            token,
        );
        self.check_fail("create_reference")?;

        let mut inner = self.inner.lock().unwrap();
        if !inner.commits.contains_key(sha) {
            return Err(unprocessable("Object does not exist"));
        }
        let repository = inner.repo_mut(repo)?;
        if repository.refs.contains_key(name.as_str()) {
            return Err(GatewayError::ReferenceConflict(name.clone()));
        }
        repository.refs.insert(name.to_string(), sha.clone());
        Ok(Reference {
            name: name.clone(),
            sha: sha.clone(),
        })
    }

    async fn update_reference(
        &self,
        repo: &str,
        name: &RefName,
        sha: &Sha,
        token: Option<&str>,
    ) -> Result<Reference, GatewayError> {
        self.record(
            MockOperation::UpdateReference {
                repo: repo.to_string(),
                name: name.to_string(),
                sha: sha.clone(),
            },
            token,
        );
        self.check_fail("update_reference")?;

        let mut inner = self.inner.lock().unwrap();
        let current = inner
            .repo(repo)?
            .refs
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| GatewayError::ReferenceNotFound(name.clone()))?;
        if !inner.commits.contains_key(sha) {
            return Err(unprocessable("Object does not exist"));
        }
        if !inner.is_ancestor(&current, sha) {
            return Err(unprocessable("Update is not a fast forward"));
        }
        inner
            .repo_mut(repo)?
            .refs
            .insert(name.to_string(), sha.clone());
        Ok(Reference {
            name: name.clone(),
            sha: sha.clone(),
        })
    }

    async fn get_tree(
        &self,
        repo: &str,
        sha: &Sha,
        recursive: bool,
        token: Option<&str>,
    ) -> Result<Tree, GatewayError> {
        self.record(
            MockOperation::GetTree {
                repo: repo.to_string(),
                sha: sha.clone(),
                recursive,
            },
            token,
        );
        self.check_fail("get_tree")?;

        let inner = self.inner.lock().unwrap();
        inner.repo(repo)?;
        let tree = inner
            .resolve_tree(sha)
            .ok_or_else(|| GatewayError::NotFound(format!("tree {}", sha)))?;
        Ok(inner.tree_view(&tree, recursive))
    }

    async fn create_blob(
        &self,
        repo: &str,
        content: &[u8],
        token: Option<&str>,
    ) -> Result<Sha, GatewayError> {
        self.record(
            MockOperation::CreateBlob {
                repo: repo.to_string(),
                size: content.len(),
            },
            token,
        );
        self.check_fail("create_blob")?;

        let mut inner = self.inner.lock().unwrap();
        inner.repo(repo)?;
        Ok(inner.store_blob(content))
    }

    async fn create_tree(
        &self,
        repo: &str,
        request: &TreeRequest,
        token: Option<&str>,
    ) -> Result<Tree, GatewayError> {
        self.record(
            MockOperation::CreateTree {
                repo: repo.to_string(),
                request: request.clone(),
            },
            token,
        );
        self.check_fail("create_tree")?;

        let mut inner = self.inner.lock().unwrap();
        inner.repo(repo)?;

        let mut files = match &request.base_tree {
            Some(base) => inner
                .trees
                .get(base)
                .map(|stored| stored.files.clone())
                .ok_or_else(|| unprocessable(format!("base_tree {} does not exist", base)))?,
            None => BTreeMap::new(),
        };

        for entry in &request.tree {
            validate_path(&entry.path)?;
            match (entry.kind, &entry.source) {
                (EntryKind::Tree, EntrySource::Sha(sha)) => {
                    let sub = inner
                        .trees
                        .get(sha)
                        .map(|stored| stored.files.clone())
                        .ok_or_else(|| unprocessable(format!("{} is not a valid tree", sha)))?;
                    clear_path(&mut files, &entry.path);
                    for (path, record) in sub {
                        files.insert(format!("{}/{}", entry.path, path), record);
                    }
                }
                (EntryKind::Tree, EntrySource::Content(_)) => {
                    return Err(unprocessable("tree entries cannot carry content"));
                }
                (kind, source) => {
                    let sha = match source {
                        EntrySource::Content(text) => inner.store_blob(text.as_bytes()),
                        EntrySource::Sha(sha) => {
                            if kind == EntryKind::Blob && !inner.blobs.contains_key(sha) {
                                return Err(unprocessable(format!("{} is not a valid blob", sha)));
                            }
                            sha.clone()
                        }
                    };
                    clear_path(&mut files, &entry.path);
                    files.insert(
                        entry.path.clone(),
                        FileRecord {
                            mode: entry.mode,
                            sha,
                        },
                    );
                }
            }
        }

        let id = inner.store_tree(files);
        Ok(inner.tree_view(&id, false))
    }

    async fn create_commit(
        &self,
        repo: &str,
        commit: &NewCommit,
        token: Option<&str>,
    ) -> Result<Commit, GatewayError> {
        self.record(
            MockOperation::CreateCommit {
                repo: repo.to_string(),
                commit: commit.clone(),
            },
            token,
        );
        self.check_fail("create_commit")?;

        let mut inner = self.inner.lock().unwrap();
        inner.repo(repo)?;
        if !inner.trees.contains_key(&commit.tree) {
            return Err(unprocessable("Tree SHA does not exist"));
        }
        if let Some(missing) = commit.parents.iter().find(|p| !inner.commits.contains_key(*p)) {
            return Err(unprocessable(format!(
                "Parent SHA {} does not exist or is not a commit object",
                missing
            )));
        }
        Ok(inner.store_commit(commit.tree.clone(), commit.parents.clone(), &commit.message))
    }

    async fn get_content(
        &self,
        repo: &str,
        path: &str,
        branch: Option<&BranchName>,
        token: Option<&str>,
    ) -> Result<Lookup<Vec<u8>>, GatewayError> {
        self.record(
            MockOperation::GetContent {
                repo: repo.to_string(),
                path: path.to_string(),
                branch: branch.map(|b| b.to_string()),
            },
            token,
        );
        self.check_fail("get_content")?;

        let inner = self.inner.lock().unwrap();
        let Some(repository) = inner.repositories.get(repo) else {
            return Ok(Lookup::NotFound);
        };
        let branch = branch
            .map(|b| b.as_str())
            .unwrap_or(repository.repository.default_branch.as_str());
        let content = inner
            .branch_tip(repo, branch)
            .and_then(|tip| inner.files_of_commit(&tip))
            .and_then(|mut files| files.remove(path.trim_start_matches('/')));
        Ok(content.into())
    }

    async fn list_commit_statuses(
        &self,
        repo: &str,
        sha: &Sha,
        token: Option<&str>,
    ) -> Result<Vec<CommitStatus>, GatewayError> {
        self.record(
            MockOperation::ListCommitStatuses {
                repo: repo.to_string(),
                sha: sha.clone(),
            },
            token,
        );
        self.check_fail("list_commit_statuses")?;

        let inner = self.inner.lock().unwrap();
        Ok(inner
            .repo(repo)?
            .statuses
            .get(sha)
            .cloned()
            .unwrap_or_default())
    }
}
