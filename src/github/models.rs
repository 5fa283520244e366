//! GitHub 数据模型
//! Raw API shapes stay private; handlers see the trimmed views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository coordinates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueData {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryInfo {
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub url: String,
    pub language: String,
    pub stars: u64,
    pub forks: u64,
    pub default_branch: String,
}

/// One node of the contents tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeEntry {
    File { path: String, size: u64 },
    Dir { path: String, children: Vec<TreeEntry> },
}

impl TreeEntry {
    pub fn path(&self) -> &str {
        match self {
            TreeEntry::File { path, .. } | TreeEntry::Dir { path, .. } => path,
        }
    }
}

/// Decoded file plus the blob sha needed to update it
#[derive(Debug, Clone)]
pub struct FileContent {
    pub path: String,
    pub sha: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequestRef {
    pub number: u64,
    pub url: String,
    pub branch: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUser {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawIssue {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: RawUser,
}

impl From<RawIssue> for IssueData {
    fn from(raw: RawIssue) -> Self {
        Self {
            number: raw.number,
            title: raw.title,
            body: raw.body.unwrap_or_default(),
            state: raw.state,
            url: raw.html_url,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            user: raw.user.login,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRepository {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub language: Option<String>,
    pub stargazers_count: u64,
    pub forks_count: u64,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

impl From<RawRepository> for RepositoryInfo {
    fn from(raw: RawRepository) -> Self {
        Self {
            name: raw.name,
            full_name: raw.full_name,
            description: raw.description.unwrap_or_default(),
            url: raw.html_url,
            language: raw.language.unwrap_or_default(),
            stars: raw.stargazers_count,
            forks: raw.forks_count,
            default_branch: raw.default_branch,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawContentItem {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFile {
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawInstallation {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAccessToken {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRef {
    pub object: RawRefObject,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRefObject {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPull {
    pub number: Option<u64>,
    pub html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawComment {
    pub id: u64,
}
