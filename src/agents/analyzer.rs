//! 分析智能体：issue -> 技术规格

use std::sync::Arc;

use tracing::{debug, info};

use super::AgentError;
use crate::llm::ChatModel;

const NAME: &str = "IssueAnalyzer";

const INSTRUCTIONS: &str = "You are an experienced technical analyst who turns issue descriptions \
into clear technical specifications for developers.

Your job:
1. Analyze the issue description
2. Extract the key requirements
3. Identify the technical details
4. Produce a structured specification

The specification must include:
- Goal of the task
- Description of the problem or requirement
- Technical requirements
- Expected result
- Acceptance criteria (if possible)
- List of files that need to change (if they can be determined)

Be concrete and technically precise.";

pub struct IssueAnalyzer {
    model: Arc<dyn ChatModel>,
}

impl IssueAnalyzer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn analyze(
        &self,
        title: &str,
        body: &str,
        repository: &str,
    ) -> Result<String, AgentError> {
        let prompt = prompt(title, body, repository);
        info!(agent = NAME, repository = %repository, "Analyzing issue");

        let spec = self
            .model
            .complete(INSTRUCTIONS, &prompt)
            .await
            .map_err(AgentError::llm(NAME))?;

        info!(agent = NAME, chars = spec.chars().count(), "Technical specification created");
        debug!(agent = NAME, head = %spec.chars().take(200).collect::<String>(), "Specification head");
        Ok(spec)
    }
}

fn prompt(title: &str, body: &str, repository: &str) -> String {
    let body = if body.trim().is_empty() {
        "No description provided"
    } else {
        body
    };

    format!(
        "REPOSITORY: {repository}\n\nISSUE TITLE: {title}\n\nISSUE DESCRIPTION:\n{body}\n\n\
         Analyze this issue and write a detailed technical specification for a developer.\n"
    )
}
