//! Issue 修复流水线模型

use serde::{Deserialize, Serialize};

use super::analysis::IdParam;
use crate::agents::ReviewVerdict;
use crate::ci::{CiComparison, CiReport};
use crate::github::{FailedFile, PullRequestRef};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveRequest {
    pub issue_url: Option<String>,
    pub installation_id: Option<IdParam>,
    /// Reuse this PR instead of opening a new one
    pub pr_number: Option<u64>,
    pub ci_before: Option<CiReport>,
    pub ci_after: Option<CiReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveReport {
    pub success: bool,
    pub repository: String,
    pub issue_number: u64,
    pub branch: String,
    pub technical_spec: String,
    pub files: Vec<String>,
    pub fixed_files: Vec<String>,
    pub failed_files: Vec<FailedFile>,
    pub pull_request: Option<PullRequestRef>,
    pub ci: Option<CiComparison>,
    pub review: Option<ReviewVerdict>,
    pub message: String,
}
