//! 开发智能体：按技术规格改写文件

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::{extract_fenced, AgentError};
use crate::llm::ChatModel;

const NAME: &str = "CodeDeveloper";

const INSTRUCTIONS: &str = "You are an experienced developer who fixes code according to a \
technical specification.

Your job:
1. Study the technical specification
2. Analyze the current code
3. Make the necessary changes
4. Make sure the code meets the specification

You must:
- Write clean, readable code
- Follow established programming practices
- Keep the existing structure of the code where possible
- Add comments
- Make sure the changes solve the problem from the specification

Answer format:
- The complete modified file
- A short description of the changes
- Why these changes solve the problem";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeFix {
    pub file_path: String,
    pub fixed_code: String,
}

pub struct CodeDeveloper {
    model: Arc<dyn ChatModel>,
}

impl CodeDeveloper {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn fix(
        &self,
        technical_spec: &str,
        file_path: &str,
        current_code: &str,
        repository: &str,
    ) -> Result<CodeFix, AgentError> {
        if technical_spec.trim().is_empty() {
            return Err(AgentError::MissingTechnicalSpec);
        }

        let lang = fence_language(file_path);
        let prompt = format!(
            "REPOSITORY: {repository}\nFILE: {file_path}\n\nTECHNICAL SPECIFICATION:\n{technical_spec}\n\n\
             CURRENT FILE CONTENT:\n```{lang}\n{current_code}\n```\n\n\
             Fix the code according to the technical specification. Return the complete fixed file.\n"
        );

        info!(agent = NAME, file = %file_path, "Fixing file");

        let answer = self
            .model
            .complete(INSTRUCTIONS, &prompt)
            .await
            .map_err(AgentError::llm(NAME))?;

        let fixed_code = extract_fenced(&answer, Some(lang)).to_string();
        if fixed_code.is_empty() {
            return Err(AgentError::EmptyCode(file_path.to_string()));
        }
        info!(agent = NAME, file = %file_path, "File fixed");

        Ok(CodeFix {
            file_path: file_path.to_string(),
            fixed_code,
        })
    }
}

/// Markdown fence tag for a path, empty when unknown.
pub fn fence_language(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match ext.as_str() {
        "py" => "python",
        "rs" => "rust",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "jsx",
        "ts" => "typescript",
        "tsx" => "tsx",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "php" => "php",
        "rb" => "ruby",
        "yml" | "yaml" => "yaml",
        "json" => "json",
        "toml" => "toml",
        "md" => "markdown",
        "html" => "html",
        "css" => "css",
        "sh" => "bash",
        _ => "",
    }
}
