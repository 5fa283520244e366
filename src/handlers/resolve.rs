//! Issue 修复处理器

use axum::{body::Bytes, extract::State, Json};
use std::sync::Arc;

use super::parse_json_body;
use crate::{
    error::Result,
    middleware::AppState,
    models::{ResolveReport, ResolveRequest},
};

/// POST /resolve
pub async fn resolve_issue(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ResolveReport>> {
    let request: ResolveRequest = parse_json_body(&body)?;
    let report = state.resolver.resolve(&request).await?;
    Ok(Json(report))
}
