//! HTTP 中间件
//! 应用状态与请求追踪

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    agents::AgentSystem,
    config::AppConfig,
    error::Result,
    github::GitHubClient,
    llm::{ChatModel, OpenAiCompatible},
    services::{IssueAnalysisService, IssueResolver},
};

/// 应用状态
///
/// Built once at startup and shared read-only between requests.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub github: Arc<GitHubClient>,
    pub analysis: Arc<IssueAnalysisService>,
    pub resolver: Arc<IssueResolver>,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let model: Arc<dyn ChatModel> = Arc::new(OpenAiCompatible::from_config(&config.llm)?);
        Self::with_model(config, model)
    }

    /// State around an already constructed chat model.
    pub fn with_model(config: AppConfig, model: Arc<dyn ChatModel>) -> Result<Self> {
        let github = Arc::new(GitHubClient::from_config(&config.github)?);
        let agents = Arc::new(AgentSystem::new(model));

        let analysis = Arc::new(IssueAnalysisService::new(
            github.clone(),
            agents.clone(),
            config.github.installation_id,
        ));
        let resolver = Arc::new(IssueResolver::new(
            analysis.clone(),
            agents,
            config.github.structure_max_depth,
        ));

        Ok(Self {
            config,
            github,
            analysis,
            resolver,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let uri = req.uri().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();
        let mut response = next.run(req).await;
        let elapsed = start.elapsed();

        let status = response.status().as_u16();
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            _ => "OTHER",
        };
        let status_class = match status {
            200..=299 => "2xx",
            400..=499 => "4xx",
            500..=599 => "5xx",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_class)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
