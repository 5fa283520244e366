//! GitHub REST API 客户端
//!
//! `GitHubClient` holds app credentials and the shared HTTP pool.
//! `Session` is a client bound to one access token (installation or
//! personal) and carries the repository operations.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION},
    Client, Method, RequestBuilder, StatusCode, Url,
};
use secrecy::{ExposeSecret, Secret};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{
    auth::AppCredentials,
    models::{
        FileContent, IssueData, RawAccessToken, RawContentItem, RawFile, RawInstallation, RawRef,
        RawRepository, RepoId, RepositoryInfo, TreeEntry, RawIssue,
    },
    GitHubError,
};
use crate::config::GitHubConfig;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// GitHub 客户端
pub struct GitHubClient {
    http: Client,
    api_url: String,
    web_url: String,
    app: Option<AppCredentials>,
    personal_token: Option<Secret<String>>,
}

impl GitHubClient {
    pub fn from_config(config: &GitHubConfig) -> Result<Self, GitHubError> {
        let app = AppCredentials::from_config(config)?;
        Self::new(config, app)
    }

    pub fn new(config: &GitHubConfig, app: Option<AppCredentials>) -> Result<Self, GitHubError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));

        let http = Client::builder()
            .user_agent(concat!("issue-agent/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            web_url: config.web_url.trim_end_matches('/').to_string(),
            app,
            personal_token: config.token.clone(),
        })
    }

    pub fn app_configured(&self) -> bool {
        self.app.is_some()
    }

    pub fn web_url(&self) -> &str {
        &self.web_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn app_request(&self, method: Method, path: &str) -> Result<RequestBuilder, GitHubError> {
        let app = self.app.as_ref().ok_or(GitHubError::AppNotConfigured)?;
        let jwt = app.app_jwt()?;
        Ok(self
            .http
            .request(method, self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", jwt)))
    }

    /// Exchanges the app JWT for an installation access token.
    pub async fn installation_token(
        &self,
        installation_id: u64,
    ) -> Result<Secret<String>, GitHubError> {
        let response = self
            .app_request(
                Method::POST,
                &format!("/app/installations/{}/access_tokens", installation_id),
            )?
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(GitHubError::from_response("failed to get access token", response).await);
        }

        let token: RawAccessToken = response.json().await?;
        Ok(Secret::new(token.token))
    }

    /// Installation id whose token can read `owner/repo`.
    ///
    /// Never fails: discovery problems are logged and reported as `None`.
    pub async fn find_installation_for_repo(&self, repo: &RepoId) -> Option<u64> {
        if !self.app_configured() {
            warn!("GitHub App is not configured, skipping installation lookup");
            return None;
        }

        match self.try_find_installation(repo).await {
            Ok(found) => {
                match found {
                    Some(id) => info!(installation_id = id, repo = %repo.full_name(), "Installation found"),
                    None => warn!(repo = %repo.full_name(), "No installation has access to repository"),
                }
                found
            }
            Err(e) => {
                warn!(error = %e, repo = %repo.full_name(), "Installation lookup failed");
                None
            }
        }
    }

    async fn try_find_installation(&self, repo: &RepoId) -> Result<Option<u64>, GitHubError> {
        let response = self
            .app_request(Method::GET, "/app/installations")?
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(GitHubError::from_response("failed to list installations", response).await);
        }

        let installations: Vec<RawInstallation> = response.json().await?;

        for installation in installations {
            let session = match self.installation_token(installation.id).await {
                Ok(token) => self.session(token),
                Err(e) => {
                    debug!(installation_id = installation.id, error = %e, "Skipping installation");
                    continue;
                }
            };

            match session.repository_status(repo).await {
                Ok(StatusCode::OK) => return Ok(Some(installation.id)),
                Ok(status) => {
                    debug!(installation_id = installation.id, status = %status, "Installation cannot see repository")
                }
                Err(e) => {
                    debug!(installation_id = installation.id, error = %e, "Skipping installation")
                }
            }
        }

        Ok(None)
    }

    fn session(&self, token: Secret<String>) -> Session<'_> {
        Session {
            client: self,
            token,
        }
    }

    /// Installation token when an id is given, otherwise the personal token.
    pub async fn authorize(&self, installation_id: Option<u64>) -> Result<Session<'_>, GitHubError> {
        if let Some(id) = installation_id {
            let token = self.installation_token(id).await?;
            return Ok(self.session(token));
        }

        match &self.personal_token {
            Some(token) => Ok(self.session(token.clone())),
            None => Err(GitHubError::MissingCredentials),
        }
    }
}

/// Token-scoped GitHub access
pub struct Session<'a> {
    client: &'a GitHubClient,
    token: Secret<String>,
}

impl<'a> Session<'a> {
    pub fn web_url(&self) -> &str {
        self.client.web_url()
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, self.client.url(path))
    }

    pub(crate) fn request_url(&self, method: Method, url: impl reqwest::IntoUrl) -> RequestBuilder {
        self.client
            .http
            .request(method, url)
            .header(AUTHORIZATION, format!("token {}", self.token.expose_secret()))
    }

    pub(crate) fn parse_url(&self, path: &str) -> Result<Url, GitHubError> {
        Url::parse(&self.client.url(path)).map_err(|e| GitHubError::InvalidUrl(e.to_string()))
    }

    async fn repository_status(&self, repo: &RepoId) -> Result<StatusCode, GitHubError> {
        let response = self
            .request(Method::GET, &format!("/repos/{}/{}", repo.owner, repo.repo))
            .send()
            .await?;
        Ok(response.status())
    }

    pub async fn get_issue(&self, repo: &RepoId, number: u64) -> Result<IssueData, GitHubError> {
        let response = self
            .request(
                Method::GET,
                &format!("/repos/{}/{}/issues/{}", repo.owner, repo.repo, number),
            )
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(GitHubError::from_response("failed to get issue", response).await);
        }

        let raw: RawIssue = response.json().await?;
        Ok(raw.into())
    }

    pub async fn get_repository(&self, repo: &RepoId) -> Result<RepositoryInfo, GitHubError> {
        let response = self
            .request(Method::GET, &format!("/repos/{}/{}", repo.owner, repo.repo))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(
                GitHubError::from_response("failed to get repository data", response).await,
            );
        }

        let raw: RawRepository = response.json().await?;
        Ok(raw.into())
    }

    /// Contents tree of `branch`. Levels GitHub refuses to list come back
    /// empty; directories at `max_depth` are left out.
    pub async fn repository_structure(
        &self,
        repo: &RepoId,
        branch: &str,
        max_depth: usize,
    ) -> Result<Vec<TreeEntry>, GitHubError> {
        self.list_dir(repo, branch, String::new(), 0, max_depth)
            .await
    }

    fn list_dir<'s>(
        &'s self,
        repo: &'s RepoId,
        branch: &'s str,
        path: String,
        depth: usize,
        max_depth: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TreeEntry>, GitHubError>> + Send + 's>> {
        Box::pin(async move {
            if depth > max_depth {
                return Ok(Vec::new());
            }

            let url = self.contents_url(repo, &path, Some(branch))?;
            let response = self.request_url(Method::GET, url).send().await?;

            if response.status() != StatusCode::OK {
                debug!(path = %path, status = %response.status(), "Contents listing unavailable");
                return Ok(Vec::new());
            }

            let items: Vec<RawContentItem> = response.json().await?;
            let mut entries = Vec::with_capacity(items.len());

            for item in items {
                match item.kind.as_str() {
                    "file" => entries.push(TreeEntry::File {
                        path: item.path,
                        size: item.size,
                    }),
                    "dir" if depth < max_depth => {
                        let children = self
                            .list_dir(repo, branch, item.path.clone(), depth + 1, max_depth)
                            .await?;
                        entries.push(TreeEntry::Dir {
                            path: item.path,
                            children,
                        });
                    }
                    _ => {}
                }
            }

            Ok(entries)
        })
    }

    fn contents_url(
        &self,
        repo: &RepoId,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Url, GitHubError> {
        let mut url = self.parse_url(&format!("/repos/{}/{}/contents", repo.owner, repo.repo))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| GitHubError::InvalidUrl("API URL cannot be a base".to_string()))?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
        if let Some(git_ref) = git_ref {
            url.query_pairs_mut().append_pair("ref", git_ref);
        }
        Ok(url)
    }

    /// `None` when the file does not exist at `git_ref`.
    pub async fn get_file(
        &self,
        repo: &RepoId,
        path: &str,
        git_ref: &str,
    ) -> Result<Option<FileContent>, GitHubError> {
        let url = self.contents_url(repo, path, Some(git_ref))?;
        let response = self.request_url(Method::GET, url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if response.status() != StatusCode::OK {
            return Err(GitHubError::from_response("failed to get file", response).await);
        }

        let raw: RawFile = response.json().await?;
        let encoded: String = raw.content.split_whitespace().collect();
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| GitHubError::Decode(format!("{}: {}", raw.path, e)))?;
        let content = String::from_utf8(bytes)
            .map_err(|_| GitHubError::Decode(format!("{} is not UTF-8 text", raw.path)))?;

        Ok(Some(FileContent {
            path: raw.path,
            sha: raw.sha,
            content,
        }))
    }

    /// Creates or updates a file on `branch` with a single commit.
    pub async fn put_file(
        &self,
        repo: &RepoId,
        path: &str,
        branch: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> Result<(), GitHubError> {
        let url = self.contents_url(repo, path, None)?;
        let mut body = json!({
            "message": message,
            "content": STANDARD.encode(content.as_bytes()),
            "branch": branch,
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }

        let response = self.request_url(Method::PUT, url).json(&body).send().await?;

        if !matches!(response.status(), StatusCode::OK | StatusCode::CREATED) {
            return Err(GitHubError::from_response("failed to commit file", response).await);
        }

        debug!(path = %path, branch = %branch, "File committed");
        Ok(())
    }

    /// Head commit of `branch`, `None` if the branch does not exist.
    pub async fn branch_sha(&self, repo: &RepoId, branch: &str) -> Result<Option<String>, GitHubError> {
        let response = self
            .request(
                Method::GET,
                &format!("/repos/{}/{}/git/ref/heads/{}", repo.owner, repo.repo, branch),
            )
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Ok(None);
        }

        let raw: RawRef = response.json().await?;
        Ok(Some(raw.object.sha))
    }

    /// Creates `branch` from the head of `base`; an existing branch is fine.
    pub async fn create_branch(&self, repo: &RepoId, branch: &str, base: &str) -> Result<(), GitHubError> {
        let base_sha = self.branch_sha(repo, base).await?.ok_or_else(|| GitHubError::Api {
            context: format!("failed to get branch {}", base),
            status: StatusCode::NOT_FOUND.as_u16(),
            body: String::new(),
        })?;

        let response = self
            .request(Method::POST, &format!("/repos/{}/{}/git/refs", repo.owner, repo.repo))
            .json(&json!({
                "ref": format!("refs/heads/{}", branch),
                "sha": base_sha,
            }))
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => {
                info!(branch = %branch, "Branch created");
                Ok(())
            }
            StatusCode::UNPROCESSABLE_ENTITY => {
                info!(branch = %branch, "Branch already exists");
                Ok(())
            }
            _ => Err(GitHubError::from_response("failed to create branch", response).await),
        }
    }
}
