//! Run reports: a console rendering and a JSON document.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::runner::{ScenarioResult, ScenarioVerdict};

/// Counts of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub expected_failures: usize,
    pub unexpected_passes: usize,
    /// Defect reports across all scenarios.
    pub findings: usize,
    /// Scenarios that shared a uniqueifier with another.
    pub collision_risks: usize,
}

impl Summary {
    pub fn of(results: &[ScenarioResult]) -> Self {
        let mut summary = Summary {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.verdict {
                ScenarioVerdict::Passed => summary.passed += 1,
                ScenarioVerdict::Failed => summary.failed += 1,
                ScenarioVerdict::ExpectedFailure => summary.expected_failures += 1,
                ScenarioVerdict::UnexpectedPass => summary.unexpected_passes += 1,
            }
            summary.findings += result.findings.len();
            if result.collision_risk {
                summary.collision_risks += 1;
            }
        }
        summary
    }

    /// Green when nothing failed and no known defect unexpectedly passed.
    pub fn is_green(&self) -> bool {
        self.failed == 0 && self.unexpected_passes == 0
    }

    /// Process exit code for the run.
    pub fn exit_code(&self) -> i32 {
        if self.is_green() {
            0
        } else {
            1
        }
    }
}

/// Serialized form of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub summary: Summary,
    pub scenarios: Vec<ScenarioResult>,
}

impl RunReport {
    pub fn new(scenarios: Vec<ScenarioResult>) -> Self {
        Self {
            generated_at: Utc::now(),
            summary: Summary::of(&scenarios),
            scenarios,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn verdict_label(verdict: ScenarioVerdict) -> &'static str {
    match verdict {
        ScenarioVerdict::Passed => "PASSED",
        ScenarioVerdict::Failed => "FAILED",
        ScenarioVerdict::ExpectedFailure => "EXPECTED FAILURE",
        ScenarioVerdict::UnexpectedPass => "UNEXPECTED PASS",
    }
}

/// Renders one scenario result for the console.
pub fn render_result(result: &ScenarioResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n=== {} ===", result.name);
    let _ = writeln!(out, "Verdict: {}", verdict_label(result.verdict));
    let _ = writeln!(out, "Run: {}", result.run_id);
    let _ = writeln!(out, "Duration: {}ms", result.duration_ms);
    if result.collision_risk {
        let _ = writeln!(
            out,
            "Suffix: {} (shared with another scenario, names may collide)",
            result.suffix
        );
    }

    if !result.steps.is_empty() {
        let _ = writeln!(out, "Steps:");
        for step in &result.steps {
            let mark = if step.passed { "ok" } else { "MISMATCH" };
            let _ = writeln!(
                out,
                "  {:>2}. [{}] {} as {}: expected {}, saw {}",
                step.index, mark, step.action, step.actor, step.expected, step.observed
            );
        }
    }

    if !result.transitions.is_empty() {
        let path: Vec<String> = result.transitions.iter().map(|t| t.to.to_string()).collect();
        let _ = writeln!(out, "Transitions: {}", path.join(" -> "));
    }

    for finding in &result.findings {
        let _ = writeln!(out, "\n{}", finding);
    }

    if let Some(error) = &result.error {
        let _ = writeln!(out, "\nError: {}", error);
    }
    if !result.teardown_errors.is_empty() {
        let _ = writeln!(out, "Teardown:");
        for error in &result.teardown_errors {
            let _ = writeln!(out, "  - {}", error);
        }
    }
    out
}

/// Renders all results followed by the summary banner.
pub fn render_text(results: &[ScenarioResult]) -> String {
    let mut out = String::new();
    for result in results {
        out.push_str(&render_result(result));
    }

    let summary = Summary::of(results);
    let _ = writeln!(out, "\n{}", "=".repeat(60));
    let _ = writeln!(
        out,
        "{} scenarios: {} passed, {} failed, {} expected failures, {} unexpected passes",
        summary.total,
        summary.passed,
        summary.failed,
        summary.expected_failures,
        summary.unexpected_passes
    );
    let _ = writeln!(out, "Findings: {}", summary.findings);
    if summary.collision_risks > 0 {
        let _ = writeln!(out, "Suffix collisions: {}", summary.collision_risks);
    }
    let _ = writeln!(out, "{}", "=".repeat(60));
    out
}
