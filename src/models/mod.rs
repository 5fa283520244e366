//! 请求与响应模型

pub mod analysis;
pub mod resolve;

pub use analysis::{
    AnalysisReport, AnalyzeRequest, IdParam, IssueSummary, RepositoryResponse, RepositorySummary,
};
pub use resolve::{ResolveReport, ResolveRequest};
