//! 业务服务层

pub mod analysis_service;
pub mod resolver_service;

pub use analysis_service::IssueAnalysisService;
pub use resolver_service::IssueResolver;
