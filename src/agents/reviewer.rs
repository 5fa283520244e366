//! 评审智能体
//! Judges a change against the issue, the technical specification and the CI before/after runs.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use super::{extract_fenced, AgentError};
use crate::ci::{Change, CiReport, StepResult};
use crate::llm::ChatModel;

const NAME: &str = "Reviewer";

/// Longest CI error excerpt, and longest free-text reason kept
const EXCERPT_CHARS: usize = 500;

const INSTRUCTIONS: &str = "You are an experienced code reviewer checking a code change.

Your job:
1. Study the original task (issue)
2. Analyze the technical specification
3. Check the changes that were made
4. Compare the CI results before and after the changes
5. Give a verdict: is the change accepted or not

MANDATORY ACCEPTANCE CRITERIA:
- CI RESULTS BEFORE AND AFTER THE CHANGES MUST MATCH:
  * If the build check passed BEFORE the changes it MUST pass AFTER
  * If the build check failed BEFORE it MAY still fail AFTER (fixing it is better)
  * If tests passed BEFORE the changes they MUST pass AFTER
  * If tests failed BEFORE they MAY still fail AFTER (fixing them is better)

- NEVER approve a change when:
  * The build check passed BEFORE but fails AFTER - REJECT
  * Tests passed BEFORE but fail AFTER - REJECT
  * CI got worse in any way - REJECT

IMPORTANT:
- CI results before and after must be IDENTICAL or BETTER.
- Code quality is NOT an acceptance criterion, only the build check and tests are.

If the change does not meet the criteria you must:
- Describe the problem clearly
- Say exactly what does not work
- Say how the CI results changed
- Give recommendations for fixing it

Answer with JSON:
{
    \"approved\": true/false,
    \"reason\": \"short explanation of the verdict\",
    \"issues\": [\"problems, if any\"],
    \"recommendations\": [\"how to fix them, if any\"]
}";

const RULE: &str = "===============================================================";

/// `"approved": true|false` inside an answer that is not valid JSON
static APPROVED_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)["']?approved["']?\s*:\s*(true|false)"#).expect("valid approved regex")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    #[serde(default, deserialize_with = "null_as_default")]
    pub approved: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendations: Vec<String>,
}

/// Models answer `null` for empty lists; treat it like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ReviewVerdict {
    /// JSON verdict, fenced or bare; otherwise the verdict is read from
    /// the text itself.
    pub fn parse(answer: &str) -> Self {
        let text = extract_fenced(answer, Some("json"));

        match serde_json::from_str::<ReviewVerdict>(text) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "Reviewer answer is not JSON, inferring verdict from text");
                let approved = match APPROVED_KEY.captures(text) {
                    Some(caps) => caps[1].eq_ignore_ascii_case("true"),
                    None => text.to_lowercase().contains("approved"),
                };
                ReviewVerdict {
                    approved,
                    reason: text.chars().take(EXCERPT_CHARS).collect(),
                    issues: Vec::new(),
                    recommendations: Vec::new(),
                }
            }
        }
    }

    /// Markdown for the PR comment.
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "## Review verdict: {}\n\n{}\n",
            if self.approved { "approved" } else { "rejected" },
            self.reason
        );
        if !self.issues.is_empty() {
            out.push_str("\n### Issues\n");
            for issue in &self.issues {
                out.push_str(&format!("- {}\n", issue));
            }
        }
        if !self.recommendations.is_empty() {
            out.push_str("\n### Recommendations\n");
            for rec in &self.recommendations {
                out.push_str(&format!("- {}\n", rec));
            }
        }
        out
    }
}

pub struct ReviewInput<'a> {
    pub repository: &'a str,
    pub issue_title: &'a str,
    pub issue_body: &'a str,
    pub technical_spec: &'a str,
    pub changed_files: &'a [String],
    pub ci_before: Option<&'a CiReport>,
    pub ci_after: Option<&'a CiReport>,
}

pub struct Reviewer {
    model: Arc<dyn ChatModel>,
}

impl Reviewer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn review(&self, input: &ReviewInput<'_>) -> Result<ReviewVerdict, AgentError> {
        let files = if input.changed_files.is_empty() {
            "Not specified".to_string()
        } else {
            input.changed_files.join(", ")
        };

        let prompt = format!(
            "REPOSITORY: {repository}\n\nORIGINAL TASK:\nTitle: {title}\nDescription: {body}\n\n\
             TECHNICAL SPECIFICATION:\n{spec}\n\nCHANGED FILES:\n{files}\n\n{comparison}\n\
             ERROR DETAILS AFTER THE CHANGES (if any):\n{details}\n\n\
             Compare the CI results BEFORE and AFTER the changes. They MUST match or be better. \
             If the build check or tests passed BEFORE but fail AFTER, you MUST reject the change.\n\n\
             Review the change and give your verdict. Answer ONLY with a JSON object in the required format.\n",
            repository = input.repository,
            title = input.issue_title,
            body = input.issue_body,
            spec = input.technical_spec,
            files = files,
            comparison = format_ci_comparison(input.ci_before, input.ci_after),
            details = format_ci_details(input.ci_after),
        );

        info!(agent = NAME, repository = %input.repository, "Reviewing changes");

        let answer = self
            .model
            .complete(INSTRUCTIONS, &prompt)
            .await
            .map_err(AgentError::llm(NAME))?;

        let verdict = ReviewVerdict::parse(&answer);
        info!(agent = NAME, approved = verdict.approved, "Verdict ready");
        Ok(verdict)
    }
}

fn status_line(label: &str, status: Option<bool>) -> String {
    match status {
        Some(true) => format!("{}: passed", label),
        Some(false) => format!("{}: failed", label),
        None => format!("{}: not checked", label),
    }
}

fn change_marker(check: &str, change: Option<Change>) -> String {
    match change {
        Some(Change::Regression) => format!(
            " [REGRESSION: {} passed BEFORE but fails AFTER - REJECT]",
            check
        ),
        Some(Change::Improvement) => format!(
            " [IMPROVEMENT: {} failed BEFORE but passes AFTER]",
            check
        ),
        Some(Change::Unchanged) => " [unchanged]".to_string(),
        None => String::new(),
    }
}

/// Side-by-side CI summary with regression markers.
pub fn format_ci_comparison(before: Option<&CiReport>, after: Option<&CiReport>) -> String {
    let before = before.map(|r| r.summary.clone()).unwrap_or_default();
    let after = after.map(|r| r.summary.clone()).unwrap_or_default();

    let build_change = change_marker(
        "the build check",
        Change::between(before.build_passed, after.build_passed),
    );
    let test_change = change_marker("tests", Change::between(before.test_passed, after.test_passed));

    format!(
        "{RULE}\nCI RESULTS BEFORE AND AFTER THE CHANGES\n{RULE}\n\n\
         CI BEFORE THE CHANGES:\n{}\n{}\n\n\
         CI AFTER THE CHANGES:\n{}{}\n{}{}\n\n\
         {RULE}\nRULE: CI results BEFORE and AFTER must MATCH or be BETTER.\n\
         Code quality is NOT an acceptance criterion, only the build check and tests are.\n{RULE}\n",
        status_line("Build check", before.build_passed),
        status_line("Tests", before.test_passed),
        status_line("Build check", after.build_passed),
        build_change,
        status_line("Tests", after.test_passed),
        test_change,
    )
}

/// Error output of failing CI steps, each cut to a short excerpt.
pub fn format_ci_details(report: Option<&CiReport>) -> String {
    let Some(results) = report.and_then(|r| r.results.as_ref()) else {
        return "No details".to_string();
    };

    let failing = |label: &str, step: &Option<StepResult>| {
        step.as_ref().filter(|s| !s.success).map(|s| {
            format!(
                "{}:\n{}",
                label,
                s.error.chars().take(EXCERPT_CHARS).collect::<String>()
            )
        })
    };

    let details: Vec<String> = [
        failing("Build check error", &results.build),
        failing("Test error", &results.test),
    ]
    .into_iter()
    .flatten()
    .collect();

    if details.is_empty() {
        "All checks passed".to_string()
    } else {
        details.join("\n\n")
    }
}
