//! 能力说明页

use axum::Json;
use serde_json::{json, Value};

pub const SERVICE_NAME: &str = "GitHub Issue Analyzer Agent";

/// Service description with endpoints and usage.
pub async fn index() -> Json<Value> {
    Json(json!({
        "name": SERVICE_NAME,
        "pid": std::process::id(),
        "description": "AI agent that analyzes GitHub issues and writes technical specifications",
        "version": env!("CARGO_PKG_VERSION"),
        "capabilities": [
            "Analyze GitHub issues delivered by webhook",
            "Analyze an issue directly from its link",
            "Generate technical specifications automatically",
            "Resolve issues with a pull request checked by a reviewer agent"
        ],
        "endpoints": {
            "GET /": "This page: what the agent can do",
            "GET|POST /analyze": "Analyze an issue by link (issue_url, optional repo_url)",
            "GET /repo/{owner}/{repo}": "Repository information",
            "POST /resolve": "Fix an issue: commit changes on a branch and open a pull request",
            "POST /webhook": "GitHub App webhook receiver",
            "GET /health": "Liveness check"
        },
        "usage": {
            "analyze_issue": {
                "method": "POST",
                "url": "/analyze",
                "body": {
                    "repo_url": "https://github.com/owner/repo",
                    "issue_url": "https://github.com/owner/repo/issues/1"
                },
                "example": "curl -X POST http://your-server/analyze -H \"Content-Type: application/json\" -d '{\"repo_url\": \"https://github.com/owner/repo\", \"issue_url\": \"https://github.com/owner/repo/issues/1\"}'"
            }
        }
    }))
}
