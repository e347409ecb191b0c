//! forge::github
//!
//! GitHub REST implementation of [`RepoGateway`].
//!
//! # Design
//!
//! Every operation is one REST call (branch listing pages through results).
//! Requests are described as an [`ApiRequest`] and sent through a single
//! [`GitHubGateway::execute`] path that injects credentials and performs the
//! one-shot retry after a 401.
//!
//! # Authentication
//!
//! Each call takes an optional explicit token. When it is absent the
//! configured [`TokenProvider`] supplies one. If the API rejects a
//! provider-supplied token with 401, the provider drops that token (unless a
//! concurrent call already replaced it) and the request is retried exactly
//! once. Explicit tokens are used as-is.
//!
//! # Error mapping
//!
//! - 404 on repository and content reads becomes [`Lookup::NotFound`]
//! - 404 on reference reads and updates becomes `ReferenceNotFound`
//! - 422 on reference creation becomes `ReferenceConflict`
//! - any other non-success status becomes `Api { status, message }`
//!
//! # Example
//!
//! ```ignore
//! use hubcommit::forge::github::GitHubGateway;
//! use hubcommit::auth::InstallationTokenProvider;
//! use std::sync::Arc;
//!
//! let provider = Arc::new(InstallationTokenProvider::from_config(&config)?);
//! let gateway = GitHubGateway::new(provider, "acme", "deploy-bot", "https://api.github.com")?;
//! let repo = gateway.get_repository("docs-site", None).await?;
//! ```
//!
//! [`TokenProvider`]: crate::auth::TokenProvider

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::traits::{GatewayError, Lookup, RepoGateway};
use crate::auth::{InstallationTokenProvider, TokenProvider, DEFAULT_USER_AGENT};
use crate::core::config::AppConfig;
use crate::core::types::{
    Branch, BranchName, Commit, CommitStatus, NewCommit, RefName, Reference, Repository, Sha,
    Tree, TreeRequest,
};

/// Media type for JSON API responses.
const ACCEPT_JSON: &str = "application/vnd.github+json";

/// Media type that makes the contents endpoint return raw bytes.
const ACCEPT_RAW: &str = "application/vnd.github.raw";

/// REST API version header value.
const API_VERSION: &str = "2022-11-28";

/// Page size for list endpoints.
const PER_PAGE: usize = 100;

/// A request to send, kept whole so it can be replayed after a token refresh.
#[derive(Debug, Clone)]
struct ApiRequest {
    method: Method,
    url: Url,
    body: Option<serde_json::Value>,
    accept: &'static str,
}

impl ApiRequest {
    fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            body: None,
            accept: ACCEPT_JSON,
        }
    }

    fn with_body<B: Serialize>(method: Method, url: Url, body: &B) -> Result<Self, GatewayError> {
        let body = serde_json::to_value(body)
            .map_err(|e| GatewayError::InvalidInput(format!("unserializable body: {}", e)))?;
        Ok(Self {
            method,
            url,
            body: Some(body),
            accept: ACCEPT_JSON,
        })
    }
}

/// Status and message of a failed response.
#[derive(Debug)]
struct ApiFailure {
    status: StatusCode,
    message: String,
}

impl From<ApiFailure> for GatewayError {
    fn from(failure: ApiFailure) -> Self {
        match failure.status {
            StatusCode::NOT_FOUND => GatewayError::NotFound(failure.message),
            status => GatewayError::Api {
                status: status.as_u16(),
                message: failure.message,
            },
        }
    }
}

/// GitHub gateway for one repository owner.
pub struct GitHubGateway {
    /// HTTP client for making requests
    client: Client,
    /// Supplies tokens when a call has no explicit one
    token_provider: Arc<dyn TokenProvider>,
    /// Account owning the repositories (user or organization)
    owner: String,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: Url,
    /// Sent as User-Agent
    service_name: String,
}

// Custom Debug to avoid exposing provider state
impl std::fmt::Debug for GitHubGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubGateway")
            .field("owner", &self.owner)
            .field("api_base", &self.api_base.as_str())
            .field("service_name", &self.service_name)
            .field("refreshable_tokens", &self.token_provider.is_refreshable())
            .finish()
    }
}

impl GitHubGateway {
    /// Create a gateway for repositories owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `api_base` is not an absolute http(s) URL.
    pub fn new(
        token_provider: Arc<dyn TokenProvider>,
        owner: impl Into<String>,
        service_name: impl Into<String>,
        api_base: &str,
    ) -> Result<Self, GatewayError> {
        let api_base = Url::parse(api_base)
            .map_err(|e| GatewayError::InvalidInput(format!("api base '{}': {}", api_base, e)))?;
        if api_base.cannot_be_a_base() {
            return Err(GatewayError::InvalidInput(format!(
                "api base '{}' cannot carry a path",
                api_base
            )));
        }

        Ok(Self {
            client: Client::new(),
            token_provider,
            owner: owner.into(),
            api_base,
            service_name: service_name.into(),
        })
    }

    /// Create a gateway authenticated as the configured app installation.
    pub fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
        let provider = InstallationTokenProvider::from_config(config)?;
        Self::new(
            Arc::new(provider),
            &config.owner,
            &config.service_name,
            &config.api_base,
        )
    }

    /// Create a gateway that shares an existing token provider.
    pub fn with_provider(
        config: &AppConfig,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Self, GatewayError> {
        Self::new(
            token_provider,
            &config.owner,
            &config.service_name,
            &config.api_base,
        )
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Build a URL from the API base and path segments.
    ///
    /// Segments containing `/` are split so nested paths stay nested; every
    /// piece is percent-encoded.
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            for segment in segments {
                path.extend(segment.split('/').filter(|piece| !piece.is_empty()));
            }
        }
        url
    }

    /// Build URL for a repository endpoint.
    fn repo_url<'a>(&'a self, repo: &'a str, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let owner = self.owner.as_str();
        self.url(["repos", owner, repo].into_iter().chain(segments))
    }

    fn headers(&self, token: &str, accept: &'static str) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| GatewayError::InvalidInput("token is not a valid header value".into()))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.service_name)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    async fn send(&self, request: &ApiRequest, token: &str) -> Result<Response, GatewayError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(self.headers(token, request.accept)?);
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        builder
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.without_url().to_string()))
    }

    /// Send `request` with the explicit token or one from the provider.
    ///
    /// A provider token rejected with 401 is dropped and the request is
    /// replayed once with a fresh token. The response is returned whatever
    /// its status.
    async fn execute(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<Response, GatewayError> {
        if let Some(token) = token {
            return self.send(request, token).await;
        }

        let token = self.token_provider.bearer_token().await?;
        let response = self.send(request, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED && self.token_provider.is_refreshable() {
            warn!(method = %request.method, "token rejected, retrying with a fresh one");
            self.token_provider.invalidate_if_current(&token).await;
            let token = self.token_provider.bearer_token().await?;
            return self.send(request, &token).await;
        }

        Ok(response)
    }

    /// Read the error message of a failed response.
    async fn failure(response: Response) -> ApiFailure {
        let status = response.status();
        let required_permissions = response
            .headers()
            .get("X-Accepted-GitHub-Permissions")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        let body = response.text().await.unwrap_or_default();
        let mut message = match serde_json::from_str::<GitHubErrorResponse>(&body) {
            Ok(err) => err.message,
            Err(_) if body.is_empty() => status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
            Err(_) => body,
        };

        if status == StatusCode::FORBIDDEN {
            if let Some(perms) = required_permissions {
                message.push_str(&format!(" [required: {}]", perms));
            }
        }

        ApiFailure { status, message }
    }

    /// Decode a successful JSON response or map the failure.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        response: Response,
    ) -> Result<T, GatewayError> {
        if !response.status().is_success() {
            return Err(Self::failure(response).await.into());
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.without_url().to_string()))
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        request: ApiRequest,
        token: Option<&str>,
    ) -> Result<T, GatewayError> {
        let response = self.execute(&request, token).await?;
        Self::handle_response(response).await
    }
}

#[async_trait]
impl RepoGateway for GitHubGateway {
    fn name(&self) -> &'static str {
        "github"
    }

    #[instrument(skip(self, token), fields(owner = %self.owner))]
    async fn get_repository(
        &self,
        repo: &str,
        token: Option<&str>,
    ) -> Result<Lookup<Repository>, GatewayError> {
        let request = ApiRequest::get(self.repo_url(repo, []));
        let response = self.execute(&request, token).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("repository not found");
            return Ok(Lookup::NotFound);
        }
        Ok(Lookup::Found(Self::handle_response(response).await?))
    }

    #[instrument(skip(self, token), fields(owner = %self.owner))]
    async fn create_repository(
        &self,
        name: &str,
        token: Option<&str>,
    ) -> Result<Repository, GatewayError> {
        let body = CreateRepositoryBody {
            name,
            private: true,
            auto_init: true,
        };
        let url = self.url(["orgs", self.owner.as_str(), "repos"]);
        self.fetch(ApiRequest::with_body(Method::POST, url, &body)?, token)
            .await
    }

    #[instrument(skip(self, token), fields(owner = %self.owner))]
    async fn list_branches(
        &self,
        repo: &str,
        token: Option<&str>,
    ) -> Result<Vec<Branch>, GatewayError> {
        let mut branches = Vec::new();
        for page in 1.. {
            let mut url = self.repo_url(repo, ["branches"]);
            url.query_pairs_mut()
                .append_pair("per_page", &PER_PAGE.to_string())
                .append_pair("page", &page.to_string());

            let batch: Vec<GitHubBranch> = self.fetch(ApiRequest::get(url), token).await?;
            let last_page = batch.len() < PER_PAGE;
            branches.extend(batch.into_iter().map(Branch::from));
            if last_page {
                break;
            }
        }
        debug!(count = branches.len(), "listed branches");
        Ok(branches)
    }

    #[instrument(skip(self, token), fields(owner = %self.owner))]
    async fn get_branch(
        &self,
        repo: &str,
        branch: &BranchName,
        token: Option<&str>,
    ) -> Result<Branch, GatewayError> {
        let url = self.repo_url(repo, ["branches", branch.as_str()]);
        let branch: GitHubBranch = self.fetch(ApiRequest::get(url), token).await?;
        Ok(branch.into())
    }

    #[instrument(skip(self, token), fields(owner = %self.owner))]
    async fn get_reference(
        &self,
        repo: &str,
        name: &RefName,
        token: Option<&str>,
    ) -> Result<Reference, GatewayError> {
        let url = self.repo_url(repo, ["git", "ref", name.without_namespace()]);
        let response = self.execute(&ApiRequest::get(url), token).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::ReferenceNotFound(name.clone()));
        }
        let reference: GitHubRef = Self::handle_response(response).await?;
        Ok(reference.into())
    }

    #[instrument(skip(self, token), fields(owner = %self.owner))]
    async fn create_reference(
        &self,
        repo: &str,
        name: &RefName,
        sha: &Sha,
        token: Option<&str>,
    ) -> Result<Reference, GatewayError> {
        let body = CreateRefBody {
            ref_name: name.as_str(),
            sha: sha.as_str(),
        };
        let url = self.repo_url(repo, ["git", "refs"]);
        let request = ApiRequest::with_body(Method::POST, url, &body)?;
        let response = self.execute(&request, token).await?;

        if response.status().is_success() {
            let reference: GitHubRef = Self::handle_response(response).await?;
            return Ok(reference.into());
        }

        let failure = Self::failure(response).await;
        if failure.status == StatusCode::UNPROCESSABLE_ENTITY
            && failure.message.to_ascii_lowercase().contains("already exists")
        {
            return Err(GatewayError::ReferenceConflict(name.clone()));
        }
        Err(failure.into())
    }

    #[instrument(skip(self, token), fields(owner = %self.owner))]
    async fn update_reference(
        &self,
        repo: &str,
        name: &RefName,
        sha: &Sha,
        token: Option<&str>,
    ) -> Result<Reference, GatewayError> {
        let body = UpdateRefBody {
            sha: sha.as_str(),
            force: false,
        };
        let url = self.repo_url(repo, ["git", "refs", name.without_namespace()]);
        let request = ApiRequest::with_body(Method::PATCH, url, &body)?;
        let response = self.execute(&request, token).await?;

        if response.status().is_success() {
            let reference: GitHubRef = Self::handle_response(response).await?;
            return Ok(reference.into());
        }

        let failure = Self::failure(response).await;
        let missing = match failure.status {
            StatusCode::NOT_FOUND => true,
            StatusCode::UNPROCESSABLE_ENTITY => failure
                .message
                .to_ascii_lowercase()
                .contains("does not exist"),
            _ => false,
        };
        if missing {
            return Err(GatewayError::ReferenceNotFound(name.clone()));
        }
        Err(failure.into())
    }

    #[instrument(skip(self, token), fields(owner = %self.owner))]
    async fn get_tree(
        &self,
        repo: &str,
        sha: &Sha,
        recursive: bool,
        token: Option<&str>,
    ) -> Result<Tree, GatewayError> {
        let mut url = self.repo_url(repo, ["git", "trees", sha.as_str()]);
        if recursive {
            url.query_pairs_mut().append_pair("recursive", "1");
        }
        let tree: Tree = self.fetch(ApiRequest::get(url), token).await?;
        if tree.truncated {
            warn!(entries = tree.entries.len(), "tree listing was truncated");
        }
        Ok(tree)
    }

    #[instrument(skip(self, content, token), fields(owner = %self.owner, size = content.len()))]
    async fn create_blob(
        &self,
        repo: &str,
        content: &[u8],
        token: Option<&str>,
    ) -> Result<Sha, GatewayError> {
        let body = CreateBlobBody {
            content: BASE64.encode(content),
            encoding: "base64",
        };
        let url = self.repo_url(repo, ["git", "blobs"]);
        let blob: GitHubObject = self
            .fetch(ApiRequest::with_body(Method::POST, url, &body)?, token)
            .await?;
        Ok(blob.sha)
    }

    #[instrument(skip(self, request, token), fields(owner = %self.owner, entries = request.tree.len(), incremental = request.base_tree.is_some()))]
    async fn create_tree(
        &self,
        repo: &str,
        request: &TreeRequest,
        token: Option<&str>,
    ) -> Result<Tree, GatewayError> {
        let url = self.repo_url(repo, ["git", "trees"]);
        self.fetch(ApiRequest::with_body(Method::POST, url, request)?, token)
            .await
    }

    #[instrument(skip(self, commit, token), fields(owner = %self.owner, tree = %commit.tree))]
    async fn create_commit(
        &self,
        repo: &str,
        commit: &NewCommit,
        token: Option<&str>,
    ) -> Result<Commit, GatewayError> {
        let url = self.repo_url(repo, ["git", "commits"]);
        let created: GitHubCommit = self
            .fetch(ApiRequest::with_body(Method::POST, url, commit)?, token)
            .await?;
        Ok(created.into())
    }

    #[instrument(skip(self, token), fields(owner = %self.owner))]
    async fn get_content(
        &self,
        repo: &str,
        path: &str,
        branch: Option<&BranchName>,
        token: Option<&str>,
    ) -> Result<Lookup<Vec<u8>>, GatewayError> {
        let mut url = self.repo_url(repo, ["contents", path]);
        if let Some(branch) = branch {
            url.query_pairs_mut().append_pair("ref", branch.as_str());
        }
        let request = ApiRequest {
            accept: ACCEPT_RAW,
            ..ApiRequest::get(url)
        };

        let response = self.execute(&request, token).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(Lookup::NotFound),
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| GatewayError::Network(e.without_url().to_string()))?;
                Ok(Lookup::Found(bytes.to_vec()))
            }
            _ => Err(Self::failure(response).await.into()),
        }
    }

    #[instrument(skip(self, token), fields(owner = %self.owner))]
    async fn list_commit_statuses(
        &self,
        repo: &str,
        sha: &Sha,
        token: Option<&str>,
    ) -> Result<Vec<CommitStatus>, GatewayError> {
        let url = self.repo_url(repo, ["commits", sha.as_str(), "statuses"]);
        self.fetch(ApiRequest::get(url), token).await
    }
}

// --------------------------------------------------------------------------
// GitHub API types (internal)
// --------------------------------------------------------------------------

#[derive(Serialize)]
struct CreateRepositoryBody<'a> {
    name: &'a str,
    private: bool,
    auto_init: bool,
}

#[derive(Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    ref_name: &'a str,
    sha: &'a str,
}

#[derive(Serialize)]
struct UpdateRefBody<'a> {
    sha: &'a str,
    force: bool,
}

#[derive(Serialize)]
struct CreateBlobBody {
    content: String,
    encoding: &'static str,
}

#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

/// Any object reference of the form `{ "sha": ... }`.
#[derive(Deserialize)]
struct GitHubObject {
    sha: Sha,
}

#[derive(Deserialize)]
struct GitHubRef {
    #[serde(rename = "ref")]
    ref_name: RefName,
    object: GitHubObject,
}

impl From<GitHubRef> for Reference {
    fn from(gh: GitHubRef) -> Self {
        Reference {
            name: gh.ref_name,
            sha: gh.object.sha,
        }
    }
}

#[derive(Deserialize)]
struct GitHubCommit {
    sha: Sha,
    tree: GitHubObject,
    #[serde(default)]
    parents: Vec<GitHubObject>,
    #[serde(default)]
    message: String,
}

impl From<GitHubCommit> for Commit {
    fn from(gh: GitHubCommit) -> Self {
        Commit {
            sha: gh.sha,
            tree: gh.tree.sha,
            parents: gh.parents.into_iter().map(|p| p.sha).collect(),
            message: gh.message,
        }
    }
}

#[derive(Deserialize)]
struct GitHubBranch {
    name: String,
    commit: GitHubObject,
    #[serde(default)]
    protected: bool,
}

impl From<GitHubBranch> for Branch {
    fn from(gh: GitHubBranch) -> Self {
        Branch {
            name: gh.name,
            sha: gh.commit.sha,
            protected: gh.protected,
        }
    }
}
