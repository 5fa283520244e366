//! Pull Request 与评论

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use super::{
    client::Session,
    models::{PullRequestRef, RawComment, RawPull, RepoId},
    GitHubError,
};

/// Longest tech spec excerpt embedded in a PR body
const SPEC_EXCERPT_CHARS: usize = 2000;

/// A file the developer agent could not change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}

/// Everything needed to open the fix PR for an issue
#[derive(Debug, Clone)]
pub struct PullRequestDraft {
    pub repo: RepoId,
    pub branch: String,
    pub base: String,
    pub issue_number: u64,
    pub technical_spec: String,
    pub fixed_files: Vec<String>,
    pub failed_files: Vec<FailedFile>,
}

impl PullRequestDraft {
    pub fn title(&self) -> String {
        format!("Fix: resolve issue #{}", self.issue_number)
    }

    pub fn body(&self) -> String {
        let files = self
            .fixed_files
            .iter()
            .map(|f| format!("- `{}`", f))
            .collect::<Vec<_>>()
            .join("\n");

        let mut body = format!(
            "## Description\nThis PR resolves issue #{number}\n\n## Changes\n{files}\n\n## Technical specification\n{spec}\n\n## Related issue\nCloses #{number}\n",
            number = self.issue_number,
            files = files,
            spec = excerpt(&self.technical_spec, SPEC_EXCERPT_CHARS),
        );

        if !self.failed_files.is_empty() {
            body.push_str("\n## Warnings\nThe following files could not be processed:\n");
            for failed in &self.failed_files {
                body.push_str(&format!("- `{}`: {}\n", failed.file, failed.error));
            }
        }

        body
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

impl<'a> Session<'a> {
    /// Comments on a PR (or issue) thread, returning the comment id.
    pub async fn create_pr_comment(
        &self,
        repo: &RepoId,
        number: u64,
        body: &str,
    ) -> Result<u64, GitHubError> {
        let response = self
            .request(
                Method::POST,
                &format!("/repos/{}/{}/issues/{}/comments", repo.owner, repo.repo, number),
            )
            .json(&json!({ "body": body }))
            .send()
            .await?;

        if !matches!(response.status(), StatusCode::OK | StatusCode::CREATED) {
            return Err(GitHubError::from_response("failed to create comment", response).await);
        }

        let comment: RawComment = response.json().await?;
        info!(pr = number, comment_id = comment.id, "Comment added");
        Ok(comment.id)
    }

    /// Opens the PR for `draft`, or returns the one that already exists.
    pub async fn create_pr_from_branch(
        &self,
        draft: &PullRequestDraft,
        existing: Option<u64>,
    ) -> Result<PullRequestRef, GitHubError> {
        let repo = &draft.repo;

        if let Some(number) = existing {
            if let Some(pr) = self.get_pull(draft, number).await? {
                info!(url = %pr.url, "Using existing pull request");
                return Ok(pr);
            }
        }

        if self.branch_sha(repo, &draft.branch).await?.is_none() {
            info!(branch = %draft.branch, "Branch does not exist, creating it");
            self.create_branch(repo, &draft.branch, &draft.base).await?;
        }

        let response = self
            .request(Method::POST, &format!("/repos/{}/{}/pulls", repo.owner, repo.repo))
            .json(&json!({
                "title": draft.title(),
                "body": draft.body(),
                "head": draft.branch,
                "base": draft.base,
            }))
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => {
                let raw: RawPull = response.json().await?;
                let pr = self
                    .pull_ref(draft, raw)
                    .ok_or_else(|| GitHubError::Decode("PR response has no number".to_string()))?;
                info!(number = pr.number, url = %pr.url, "Pull request created");
                Ok(pr)
            }
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.text().await.unwrap_or_default();

                if self.branch_sha(repo, &draft.branch).await?.is_none() {
                    return Err(GitHubError::BranchMissing(draft.branch.clone()));
                }

                for state in ["open", "all"] {
                    if let Some(pr) = self.find_pull_for_branch(draft, state).await? {
                        info!(state = %state, url = %pr.url, "Pull request already exists");
                        return Ok(pr);
                    }
                }

                error!(branch = %draft.branch, response = %excerpt(&body, 500), "Existing pull request not found after 422");
                Err(GitHubError::PullRequestLookup {
                    branch: draft.branch.clone(),
                    repo: repo.full_name(),
                })
            }
            _ => Err(GitHubError::from_response("failed to create PR", response).await),
        }
    }

    async fn get_pull(
        &self,
        draft: &PullRequestDraft,
        number: u64,
    ) -> Result<Option<PullRequestRef>, GitHubError> {
        let response = self
            .request(
                Method::GET,
                &format!("/repos/{}/{}/pulls/{}", draft.repo.owner, draft.repo.repo, number),
            )
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Ok(None);
        }

        let mut raw: RawPull = response.json().await?;
        raw.number.get_or_insert(number);
        Ok(self.pull_ref(draft, raw))
    }

    async fn find_pull_for_branch(
        &self,
        draft: &PullRequestDraft,
        state: &str,
    ) -> Result<Option<PullRequestRef>, GitHubError> {
        let repo = &draft.repo;
        let mut url = self.parse_url(&format!("/repos/{}/{}/pulls", repo.owner, repo.repo))?;
        url.query_pairs_mut()
            .append_pair("head", &format!("{}:{}", repo.owner, draft.branch))
            .append_pair("state", state);

        let response = self.request_url(Method::GET, url).send().await?;
        if response.status() != StatusCode::OK {
            error!(state = %state, status = %response.status(), "Listing pull requests failed");
            return Ok(None);
        }

        let pulls: Vec<RawPull> = response.json().await?;
        Ok(pulls
            .into_iter()
            .next()
            .and_then(|raw| self.pull_ref(draft, raw)))
    }

    fn pull_ref(&self, draft: &PullRequestDraft, raw: RawPull) -> Option<PullRequestRef> {
        let number = raw.number?;
        let url = raw.html_url.filter(|u| !u.is_empty()).unwrap_or_else(|| {
            format!("{}/{}/pull/{}", self.web_url(), draft.repo.full_name(), number)
        });
        Some(PullRequestRef {
            number,
            url,
            branch: draft.branch.clone(),
        })
    }
}
