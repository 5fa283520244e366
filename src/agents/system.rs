//! 智能体系统

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use super::{
    analyzer::IssueAnalyzer,
    developer::{CodeDeveloper, CodeFix},
    extract_fenced,
    reviewer::{ReviewInput, ReviewVerdict, Reviewer},
    AgentError,
};
use crate::github::TreeEntry;
use crate::llm::ChatModel;

const FILES_SYSTEM_PROMPT: &str = "You are an assistant that reads technical specifications and \
determines which files must change. Answer only with a JSON array of file paths.";

static QUOTED_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"["']([^"']+\.(py|js|ts|java|cpp|c|h|go|rs|php|rb|yml|yaml|json|md|txt|html|css|jsx|tsx))["']"#,
    )
    .expect("valid path regex")
});

/// Analyzer, developer and reviewer sharing one model
pub struct AgentSystem {
    model: Arc<dyn ChatModel>,
    pub analyzer: IssueAnalyzer,
    pub developer: CodeDeveloper,
    pub reviewer: Reviewer,
}

impl AgentSystem {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        info!(model = %model.model(), "Agent system initialized");
        Self {
            analyzer: IssueAnalyzer::new(model.clone()),
            developer: CodeDeveloper::new(model.clone()),
            reviewer: Reviewer::new(model.clone()),
            model,
        }
    }

    pub async fn analyze_issue(
        &self,
        title: &str,
        body: &str,
        repository: &str,
    ) -> Result<String, AgentError> {
        self.analyzer.analyze(title, body, repository).await
    }

    pub async fn fix_code(
        &self,
        technical_spec: &str,
        file_path: &str,
        current_code: &str,
        repository: &str,
    ) -> Result<CodeFix, AgentError> {
        self.developer
            .fix(technical_spec, file_path, current_code, repository)
            .await
    }

    pub async fn review_changes(&self, input: &ReviewInput<'_>) -> Result<ReviewVerdict, AgentError> {
        self.reviewer.review(input).await
    }

    /// Paths the technical specification implies should change; empty when the model can't tell.
    pub async fn determine_files_to_change(
        &self,
        technical_spec: &str,
        repository: &str,
        structure: &[TreeEntry],
    ) -> Result<Vec<String>, AgentError> {
        let layout = if structure.is_empty() {
            String::new()
        } else {
            format!("REPOSITORY STRUCTURE:\n{}\n", render_tree(structure))
        };

        let prompt = format!(
            "REPOSITORY: {repository}\n\n{layout}TECHNICAL SPECIFICATION:\n{technical_spec}\n\n\
             Analyze the technical specification and determine which files must be changed or created.\n\
             Return the file paths as a JSON array, for example: [\"file1.py\", \"src/file2.py\"]\n\
             If the files cannot be determined precisely, return an empty array [].\n\
             Answer ONLY with the JSON array, without any comments.\n"
        );

        info!(repository = %repository, "Determining files to change");

        let answer = self
            .model
            .complete(FILES_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(AgentError::llm("IssueAnalyzer"))?;

        let files = parse_file_list(&answer);
        info!(count = files.len(), files = ?files, "Files to change determined");
        Ok(files)
    }
}

/// Indented listing, directories suffixed with `/`.
pub fn render_tree(entries: &[TreeEntry]) -> String {
    fn walk(entries: &[TreeEntry], depth: usize, out: &mut String) {
        for entry in entries {
            let indent = "  ".repeat(depth);
            match entry {
                TreeEntry::File { path, .. } => out.push_str(&format!("{}{}\n", indent, path)),
                TreeEntry::Dir { path, children } => {
                    out.push_str(&format!("{}{}/\n", indent, path));
                    walk(children, depth + 1, out);
                }
            }
        }
    }

    let mut out = String::new();
    walk(entries, 0, &mut out);
    out
}

/// JSON array of paths, or quoted source paths when the answer isn't JSON.
pub fn parse_file_list(answer: &str) -> Vec<String> {
    let text = extract_fenced(answer, Some("json"));

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        Ok(other) => {
            warn!(answer = %other, "File list answer is not an array");
            Vec::new()
        }
        Err(e) => {
            warn!(error = %e, "File list answer is not JSON, scanning for quoted paths");
            QUOTED_PATH
                .captures_iter(text)
                .map(|caps| caps[1].to_string())
                .collect()
        }
    }
}
