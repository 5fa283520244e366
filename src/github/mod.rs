//! GitHub 集成
//! App 认证、Webhook 校验、REST API 访问

pub mod auth;
pub mod client;
pub mod models;
pub mod pulls;
pub mod url;
pub mod webhook;

pub use auth::AppCredentials;
pub use client::{GitHubClient, Session};
pub use models::{FileContent, IssueData, PullRequestRef, RepoId, RepositoryInfo, TreeEntry};
pub use pulls::{FailedFile, PullRequestDraft};
pub use url::{parse_github_url, GitHubRef, UrlError};
pub use webhook::{verify_signature, WebhookEvent, WebhookPayload};

use thiserror::Error;

/// GitHub 访问错误
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GITHUB_APP_ID and a private key must be configured")]
    AppNotConfigured,

    #[error("either GITHUB_INSTALLATION_ID or GITHUB_TOKEN is required")]
    MissingCredentials,

    #[error("invalid GitHub App private key: {0}")]
    PrivateKey(String),

    #[error("failed to sign app token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{context}: {status} - {body}")]
    Api {
        context: String,
        status: u16,
        body: String,
    },

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("unexpected GitHub response: {0}")]
    Decode(String),

    #[error("branch {0} does not exist; create it and commit changes before opening a PR")]
    BranchMissing(String),

    #[error("PR already exists (422) but could not be found for branch {branch} in {repo}")]
    PullRequestLookup { branch: String, repo: String },
}

impl GitHubError {
    /// HTTP status returned by GitHub, if the failure came from the API
    pub fn status(&self) -> Option<u16> {
        match self {
            GitHubError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) async fn from_response(context: &str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        GitHubError::Api {
            context: context.to_string(),
            status,
            body,
        }
    }
}
