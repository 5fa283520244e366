//! Issue 分析处理器

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use std::sync::Arc;
use tracing::info;

use super::parse_json_body;
use crate::{
    error::Result,
    middleware::AppState,
    models::{AnalysisReport, AnalyzeRequest},
};

/// GET /analyze?issue_url=...
pub async fn analyze_get(
    State(state): State<Arc<AppState>>,
    Query(request): Query<AnalyzeRequest>,
) -> Result<Json<AnalysisReport>> {
    run(&state, request).await
}

/// POST /analyze with a JSON body
pub async fn analyze_post(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<AnalysisReport>> {
    let request: AnalyzeRequest = parse_json_body(&body)?;
    run(&state, request).await
}

async fn run(state: &AppState, request: AnalyzeRequest) -> Result<Json<AnalysisReport>> {
    let report = state.analysis.analyze_issue_url(&request).await?;
    info!(
        repo = %report.repository.full_name,
        issue = report.issue.number,
        has_spec = report.technical_spec.is_some(),
        "Issue analyzed"
    );
    Ok(Json(report))
}
