//! CI 结果比对
//! CI runs elsewhere; reports arrive as request input.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CiReport {
    #[serde(default)]
    pub summary: CiSummary,
    #[serde(default)]
    pub results: Option<CiResults>,
}

/// `None` means the check did not run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CiSummary {
    pub build_passed: Option<bool>,
    pub test_passed: Option<bool>,
    pub quality_passed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CiResults {
    pub build: Option<StepResult>,
    pub test: Option<StepResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: String,
}

/// Outcome of the before/after gate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CiComparison {
    pub matches: bool,
    pub reason: String,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

/// How one check moved between two runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Regression,
    Improvement,
    Unchanged,
}

impl Change {
    /// `None` unless both runs report the check.
    pub fn between(before: Option<bool>, after: Option<bool>) -> Option<Self> {
        match (before?, after?) {
            (true, false) => Some(Change::Regression),
            (false, true) => Some(Change::Improvement),
            _ => Some(Change::Unchanged),
        }
    }
}

/// A check that passed before and fails after is a regression; anything
/// else, including improvements and missing data, is accepted.
pub fn check_ci_results_match(before: Option<&CiReport>, after: Option<&CiReport>) -> CiComparison {
    let before = before.map(|r| &r.summary).cloned().unwrap_or_default();
    let after = after.map(|r| &r.summary).cloned().unwrap_or_default();

    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if Change::between(before.build_passed, after.build_passed) == Some(Change::Regression) {
        issues.push("Build check passed before the changes but fails after them".to_string());
        recommendations
            .push("Fix the syntax errors to restore a working build".to_string());
    }

    if Change::between(before.test_passed, after.test_passed) == Some(Change::Regression) {
        issues.push("Tests passed before the changes but fail after them".to_string());
        recommendations.push("Fix the failing tests to restore a working state".to_string());
    }

    if issues.is_empty() {
        return CiComparison {
            matches: true,
            reason: "CI results match or improved".to_string(),
            issues,
            recommendations,
        };
    }

    CiComparison {
        matches: false,
        reason: issues.join("; "),
        issues,
        recommendations,
    }
}
