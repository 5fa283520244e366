//! Issue 分析服务
//! 直接请求与 webhook 共用的分析流程

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::agents::AgentSystem;
use crate::error::{AppError, Result};
use crate::github::{parse_github_url, GitHubClient, RepoId, RepositoryInfo};
use crate::models::{AnalysisReport, AnalyzeRequest, IssueSummary, RepositorySummary};
use crate::models::analysis::installation_param;

/// Issue 分析服务
pub struct IssueAnalysisService {
    github: Arc<GitHubClient>,
    agents: Arc<AgentSystem>,
    default_installation: Option<u64>,
}

impl IssueAnalysisService {
    pub fn new(
        github: Arc<GitHubClient>,
        agents: Arc<AgentSystem>,
        default_installation: Option<u64>,
    ) -> Self {
        Self {
            github,
            agents,
            default_installation,
        }
    }

    pub fn github(&self) -> &GitHubClient {
        &self.github
    }

    /// Explicit id, then discovery through the app, then the configured one.
    pub async fn resolve_installation(&self, repo: &RepoId, explicit: Option<u64>) -> Option<u64> {
        if explicit.is_some() {
            return explicit;
        }

        info!(repo = %repo.full_name(), "Looking up installation");
        match self.github.find_installation_for_repo(repo).await {
            Some(id) => Some(id),
            None => self.default_installation,
        }
    }

    /// Tech spec for an issue, or `None` when the model is unavailable or
    /// fails. Failures are logged, never returned.
    #[instrument(skip(self, title, body))]
    pub async fn analyze(&self, title: &str, body: &str, repo_full_name: &str) -> Option<String> {
        match self.agents.analyze_issue(title, body, repo_full_name).await {
            Ok(spec) => {
                metrics::counter!("issue_agent_analyses_total", "outcome" => "ok").increment(1);
                info!(chars = spec.chars().count(), "Technical specification ready");
                Some(spec)
            }
            Err(e) => {
                metrics::counter!("issue_agent_analyses_total", "outcome" => "failed").increment(1);
                warn!(error = %e, unavailable = e.is_unavailable(), "Failed to create technical specification");
                None
            }
        }
    }

    /// `/analyze`: fetch the issue behind `issue_url` and analyze it.
    #[instrument(skip(self, request), fields(issue_url = ?request.issue_url))]
    pub async fn analyze_issue_url(&self, request: &AnalyzeRequest) -> Result<AnalysisReport> {
        let issue_url = request
            .issue_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::bad_request("issue_url is required (link to the issue)"))?;

        let parsed = parse_github_url(issue_url)?;
        if let Some(repo_url) = request.repo_url.as_deref().filter(|s| !s.trim().is_empty()) {
            parse_github_url(repo_url)?;
        }

        let number = parsed.issue_number.ok_or_else(|| {
            AppError::bad_request("issue_url must contain an issue number")
        })?;
        let explicit = installation_param(request.installation_id.as_ref())?;

        let repo = RepoId::new(parsed.owner, parsed.repo);
        let installation = self.resolve_installation(&repo, explicit).await;
        let session = self.github.authorize(installation).await?;

        info!(repo = %repo.full_name(), issue = number, "Fetching issue");
        let issue = session.get_issue(&repo, number).await?;

        let full_name = repo.full_name();
        let technical_spec = self.analyze(&issue.title, &issue.body, &full_name).await;
        let message = format!("Issue #{} \"{}\" analyzed successfully", number, issue.title);

        Ok(AnalysisReport {
            success: true,
            repository: RepositorySummary {
                name: repo.repo.clone(),
                url: format!("{}/{}", self.github.web_url(), full_name),
                full_name,
            },
            issue: IssueSummary::from(issue),
            technical_spec,
            message,
        })
    }

    #[instrument(skip(self))]
    pub async fn repository_info(
        &self,
        repo: &RepoId,
        explicit: Option<u64>,
    ) -> Result<RepositoryInfo> {
        let installation = self.resolve_installation(repo, explicit).await;
        let session = self.github.authorize(installation).await?;
        Ok(session.get_repository(repo).await?)
    }
}
