//! GitHub URL 解析

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

static ISSUE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"github\.com/([^/\s?#]+)/([^/\s?#]+)/issues/(\d+)").expect("valid issue regex")
});

static REPO_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"github\.com/([^/\s?#]+)/([^/\s?#]+)").expect("valid repo regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("invalid GitHub URL: {0}")]
    Invalid(String),
}

/// owner/repo, plus the issue number for issue links
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitHubRef {
    pub owner: String,
    pub repo: String,
    pub issue_number: Option<u64>,
}

impl GitHubRef {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Issue links are tried first, then plain repository links.
pub fn parse_github_url(url: &str) -> Result<GitHubRef, UrlError> {
    if let Some(caps) = ISSUE_URL.captures(url) {
        let issue_number = caps[3]
            .parse::<u64>()
            .map_err(|_| UrlError::Invalid(url.to_string()))?;
        return Ok(GitHubRef {
            owner: caps[1].to_string(),
            repo: strip_git_suffix(&caps[2]),
            issue_number: Some(issue_number),
        });
    }

    if let Some(caps) = REPO_URL.captures(url) {
        return Ok(GitHubRef {
            owner: caps[1].to_string(),
            repo: strip_git_suffix(&caps[2]),
            issue_number: None,
        });
    }

    Err(UrlError::Invalid(url.to_string()))
}

fn strip_git_suffix(repo: &str) -> String {
    repo.strip_suffix(".git").unwrap_or(repo).to_string()
}
