//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::{handlers, middleware::AppState};

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    // 公开端点
    let public_routes = Router::new()
        .route("/", get(handlers::index::index))
        .route("/health", get(handlers::health::health_check));

    // 分析与修复
    let agent_routes = Router::new()
        .route(
            "/analyze",
            get(handlers::analyze::analyze_get).post(handlers::analyze::analyze_post),
        )
        .route("/repo/{owner}/{repo}", get(handlers::repo::get_repo_info))
        .route("/resolve", post(handlers::resolve::resolve_issue));

    // GitHub 回调
    let webhook_routes = Router::new().route("/webhook", post(handlers::webhook::handle_webhook));

    Router::new()
        .merge(public_routes)
        .merge(agent_routes)
        .merge(webhook_routes)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(crate::middleware::request_tracking_middleware))
        .with_state(state)
}
