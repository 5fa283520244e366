//! 仓库信息处理器

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::Result,
    github::RepoId,
    middleware::AppState,
    models::{analysis::installation_param, IdParam, RepositoryResponse},
};

#[derive(Debug, Default, Deserialize)]
pub struct RepoQuery {
    pub installation_id: Option<IdParam>,
}

/// GET /repo/{owner}/{repo}
pub async fn get_repo_info(
    State(state): State<Arc<AppState>>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<RepoQuery>,
) -> Result<Json<RepositoryResponse>> {
    let explicit = installation_param(query.installation_id.as_ref())?;
    let repo = RepoId::new(owner, repo);
    let repository = state.analysis.repository_info(&repo, explicit).await?;

    Ok(Json(RepositoryResponse {
        success: true,
        repository,
    }))
}
