//! 智能体
//! Analyzer, developer and reviewer agents over a shared chat model.

pub mod analyzer;
pub mod developer;
pub mod reviewer;
pub mod system;

pub use analyzer::IssueAnalyzer;
pub use developer::{CodeDeveloper, CodeFix};
pub use reviewer::{ReviewInput, ReviewVerdict, Reviewer};
pub use system::AgentSystem;

use thiserror::Error;

use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("technical specification is missing")]
    MissingTechnicalSpec,

    #[error("model returned no code for {0}")]
    EmptyCode(String),

    #[error("model returned {0} unchanged")]
    Unchanged(String),

    #[error("{agent}: {source}")]
    Llm {
        agent: &'static str,
        #[source]
        source: LlmError,
    },
}

impl AgentError {
    pub(crate) fn llm(agent: &'static str) -> impl FnOnce(LlmError) -> Self {
        move |source| AgentError::Llm { agent, source }
    }

    /// True when the model could not be reached at all (no key, transport).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            AgentError::Llm {
                source: LlmError::MissingApiKey | LlmError::Http(_),
                ..
            }
        )
    }
}

/// Body of the fenced block tagged `lang`, else of the first fenced block,
/// else the whole text. Always trimmed.
pub fn extract_fenced<'t>(text: &'t str, lang: Option<&str>) -> &'t str {
    let blocks = fenced_blocks(text);

    let tagged = lang
        .filter(|l| !l.is_empty())
        .and_then(|l| blocks.iter().find(|(info, _)| info.eq_ignore_ascii_case(l)));

    match tagged.or_else(|| blocks.first()) {
        Some((_, body)) => body.trim(),
        None => text.trim(),
    }
}

/// `(info string, body)` for every complete fence.
fn fenced_blocks(text: &str) -> Vec<(&str, &str)> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("```") {
        let after_ticks = &rest[open + 3..];
        let Some(close_inline) = after_ticks.find("```") else {
            break;
        };

        match after_ticks.find('\n') {
            Some(nl) if nl < close_inline => {
                let info = after_ticks[..nl].trim();
                let body_start = &after_ticks[nl + 1..];
                let Some(close) = body_start.find("```") else {
                    break;
                };
                blocks.push((info, &body_start[..close]));
                rest = &body_start[close + 3..];
            }
            // ```json {...}``` on one line
            _ => {
                blocks.push(split_inline_fence(&after_ticks[..close_inline]));
                rest = &after_ticks[close_inline + 3..];
            }
        }
    }

    blocks
}

/// Leading language word of a one-line fence, then the rest.
fn split_inline_fence(inner: &str) -> (&str, &str) {
    let inner = inner.trim_start();
    let tag_len = inner
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '_')))
        .unwrap_or(inner.len());
    let (tag, body) = inner.split_at(tag_len);

    // `{...}` or `[...]` right after the ticks has no tag
    if body.is_empty() || !body.starts_with(char::is_whitespace) {
        ("", inner)
    } else {
        (tag, body)
    }
}
