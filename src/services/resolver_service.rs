//! Issue 修复流水线
//! issue -> 技术规格 -> 改写文件 -> 分支提交 -> PR -> CI 比对 -> 评审评论

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use super::IssueAnalysisService;
use crate::agents::{AgentError, AgentSystem, ReviewInput, ReviewVerdict};
use crate::ci::{check_ci_results_match, CiComparison};
use crate::error::{AppError, Result};
use crate::github::{
    parse_github_url, FailedFile, IssueData, PullRequestDraft, RepoId, Session,
};
use crate::models::analysis::installation_param;
use crate::models::{ResolveReport, ResolveRequest};

pub fn branch_for_issue(number: u64) -> String {
    format!("fix/issue-{}", number)
}

/// Issue 修复服务
pub struct IssueResolver {
    analysis: Arc<IssueAnalysisService>,
    agents: Arc<AgentSystem>,
    structure_depth: usize,
}

impl IssueResolver {
    pub fn new(
        analysis: Arc<IssueAnalysisService>,
        agents: Arc<AgentSystem>,
        structure_depth: usize,
    ) -> Self {
        Self {
            analysis,
            agents,
            structure_depth,
        }
    }

    #[instrument(skip(self, request), fields(issue_url = ?request.issue_url))]
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveReport> {
        let issue_url = request
            .issue_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::bad_request("issue_url is required (link to the issue)"))?;

        let parsed = parse_github_url(issue_url)?;
        let number = parsed
            .issue_number
            .ok_or_else(|| AppError::bad_request("issue_url must contain an issue number"))?;
        let explicit = installation_param(request.installation_id.as_ref())?;

        let repo = RepoId::new(parsed.owner, parsed.repo);
        let installation = self.analysis.resolve_installation(&repo, explicit).await;
        let session = self.analysis.github().authorize(installation).await?;

        let issue = session.get_issue(&repo, number).await?;
        let repository = session.get_repository(&repo).await?;
        let full_name = repo.full_name();

        let technical_spec = self
            .agents
            .analyze_issue(&issue.title, &issue.body, &full_name)
            .await?;

        let structure = match session
            .repository_structure(&repo, &repository.default_branch, self.structure_depth)
            .await
        {
            Ok(structure) => structure,
            Err(e) => {
                warn!(error = %e, "Repository structure unavailable");
                Vec::new()
            }
        };

        let files = self
            .agents
            .determine_files_to_change(&technical_spec, &full_name, &structure)
            .await?;

        let branch = branch_for_issue(number);
        let mut report = ResolveReport {
            success: true,
            repository: full_name.clone(),
            issue_number: number,
            branch: branch.clone(),
            technical_spec,
            files,
            fixed_files: Vec::new(),
            failed_files: Vec::new(),
            pull_request: None,
            ci: None,
            review: None,
            message: String::new(),
        };

        if report.files.is_empty() {
            warn!(repo = %full_name, issue = number, "No files to change could be determined");
            report.message = format!("Issue #{}: no files to change could be determined", number);
            return Ok(report);
        }

        session
            .create_branch(&repo, &branch, &repository.default_branch)
            .await?;

        for path in report.files.clone() {
            let outcome = self
                .apply_fix(&session, &repo, &branch, &path, &report.technical_spec, number)
                .await;
            match outcome {
                Ok(()) => report.fixed_files.push(path),
                Err(e) => {
                    warn!(file = %path, error = %e, "File could not be fixed");
                    report.failed_files.push(FailedFile {
                        file: path,
                        error: e.user_message(),
                    });
                }
            }
        }

        metrics::counter!("issue_agent_files_fixed_total").increment(report.fixed_files.len() as u64);

        if report.fixed_files.is_empty() {
            report.success = false;
            report.message = format!("Issue #{}: none of the files could be fixed", number);
            return Ok(report);
        }

        let draft = PullRequestDraft {
            repo: repo.clone(),
            branch: branch.clone(),
            base: repository.default_branch.clone(),
            issue_number: number,
            technical_spec: report.technical_spec.clone(),
            fixed_files: report.fixed_files.clone(),
            failed_files: report.failed_files.clone(),
        };
        let pr = session.create_pr_from_branch(&draft, request.pr_number).await?;

        if request.ci_before.is_some() || request.ci_after.is_some() {
            let comparison =
                check_ci_results_match(request.ci_before.as_ref(), request.ci_after.as_ref());
            info!(matches = comparison.matches, reason = %comparison.reason, "CI gate checked");
            report.ci = Some(comparison);
        }

        let review = self
            .review(request, &issue, &report, report.ci.as_ref())
            .await;

        if let Some(verdict) = &review {
            if let Err(e) = session
                .create_pr_comment(&repo, pr.number, &verdict.to_markdown())
                .await
            {
                error!(pr = pr.number, error = %e, "Failed to post review comment");
            }
        }

        report.message = format!(
            "Pull request #{} opened for issue #{} with {} changed file(s)",
            pr.number,
            number,
            report.fixed_files.len()
        );
        report.pull_request = Some(pr);
        report.review = review;
        Ok(report)
    }

    /// Rewrites one file on `branch`; a missing file is created.
    async fn apply_fix(
        &self,
        session: &Session<'_>,
        repo: &RepoId,
        branch: &str,
        path: &str,
        technical_spec: &str,
        number: u64,
    ) -> Result<()> {
        let current = session.get_file(repo, path, branch).await?;
        let (content, sha) = match &current {
            Some(file) => (file.content.as_str(), Some(file.sha.as_str())),
            None => ("", None),
        };

        let fix = self
            .agents
            .fix_code(technical_spec, path, content, &repo.full_name())
            .await?;

        if fix.fixed_code.trim() == content.trim() {
            return Err(AgentError::Unchanged(path.to_string()).into());
        }

        // extracted code is trimmed; keep the file newline-terminated
        let code = format!("{}\n", fix.fixed_code);
        let message = format!("Fix #{}: update {}", number, path);
        session
            .put_file(repo, path, branch, &code, &message, sha)
            .await?;
        info!(file = %path, branch = %branch, "File committed");
        Ok(())
    }

    /// Reviewer verdict; a failed CI gate always rejects.
    async fn review(
        &self,
        request: &ResolveRequest,
        issue: &IssueData,
        report: &ResolveReport,
        ci: Option<&CiComparison>,
    ) -> Option<ReviewVerdict> {
        let input = ReviewInput {
            repository: &report.repository,
            issue_title: &issue.title,
            issue_body: &issue.body,
            technical_spec: &report.technical_spec,
            changed_files: &report.fixed_files,
            ci_before: request.ci_before.as_ref(),
            ci_after: request.ci_after.as_ref(),
        };

        let mut verdict = match self.agents.review_changes(&input).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "Review failed");
                return None;
            }
        };

        if let Some(ci) = ci.filter(|c| !c.matches) {
            verdict.approved = false;
            for issue in &ci.issues {
                if !verdict.issues.contains(issue) {
                    verdict.issues.push(issue.clone());
                }
            }
            for rec in &ci.recommendations {
                if !verdict.recommendations.contains(rec) {
                    verdict.recommendations.push(rec.clone());
                }
            }
        }

        Some(verdict)
    }
}
