//! GitHub Issue 分析智能体
//! 提供 HTTP 服务所需的全部模块

pub mod agents;
pub mod ci;
pub mod config;
pub mod error;
pub mod github;
pub mod handlers;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod telemetry;
