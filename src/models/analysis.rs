//! Issue 分析模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::github::{IssueData, RepositoryInfo};

/// Installation id as sent by clients: a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IdParam {
    Number(u64),
    Text(String),
}

impl IdParam {
    /// Blank strings count as absent.
    pub fn parse(&self) -> Result<Option<u64>, AppError> {
        match self {
            IdParam::Number(n) => Ok(Some(*n)),
            IdParam::Text(s) if s.trim().is_empty() => Ok(None),
            IdParam::Text(s) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| AppError::bad_request(format!("installation_id must be a number: {}", s))),
        }
    }
}

/// Parses an optional `installation_id` parameter.
pub fn installation_param(param: Option<&IdParam>) -> Result<Option<u64>, AppError> {
    match param {
        Some(p) => p.parse(),
        None => Ok(None),
    }
}

/// `/analyze` input, from the query string (GET) or a JSON body (POST)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    pub issue_url: Option<String>,
    pub repo_url: Option<String>,
    pub installation_id: Option<IdParam>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositorySummary {
    pub name: String,
    pub full_name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueSummary {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub url: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
}

impl From<IssueData> for IssueSummary {
    fn from(issue: IssueData) -> Self {
        Self {
            number: issue.number,
            title: issue.title,
            body: issue.body,
            url: issue.url,
            state: issue.state,
            created_at: issue.created_at,
            author: issue.user,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub repository: RepositorySummary,
    pub issue: IssueSummary,
    /// `None` when the model could not produce one
    pub technical_spec: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryResponse {
    pub success: bool,
    pub repository: RepositoryInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_param_from_json() {
        let req: AnalyzeRequest =
            serde_json::from_str(r#"{"issue_url":"u","installation_id":12}"#).unwrap();
        assert_eq!(installation_param(req.installation_id.as_ref()).unwrap(), Some(12));

        let req: AnalyzeRequest =
            serde_json::from_str(r#"{"issue_url":"u","installation_id":"34"}"#).unwrap();
        assert_eq!(installation_param(req.installation_id.as_ref()).unwrap(), Some(34));
    }

    #[test]
    fn test_id_param_blank_and_invalid() {
        assert_eq!(IdParam::Text(" ".to_string()).parse().unwrap(), None);
        assert!(IdParam::Text("abc".to_string()).parse().is_err());
        assert_eq!(installation_param(None).unwrap(), None);
    }
}
