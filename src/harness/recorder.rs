//! Compares expectations with observations and records defects.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::driver::PageDriver;
use crate::error::{Error, Result};
use crate::outcome::Outcome;
use crate::workflow::Actor;

use super::observe::Observation;

/// How a mismatch is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionMode {
    /// A mismatch ends the scenario.
    #[default]
    Required,
    /// A mismatch is recorded and the scenario continues.
    Discovery,
}

/// A divergence between documented and observed behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectReport {
    pub title: String,
    pub expected: String,
    pub actual: String,
    pub narrative: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

impl fmt::Display for DefectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BUG: {}\nExpected: {}\nActual: {}\nIssue: {}",
            self.title, self.expected, self.actual, self.narrative
        )?;
        if let Some(artifact) = &self.artifact {
            write!(f, "\nArtifact: {}", artifact.display())?;
        }
        Ok(())
    }
}

/// Where in a scenario a check happens.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub index: usize,
    pub actor: Actor,
    /// Short label of the action, e.g. `create customer`.
    pub label: String,
    /// Explanation used as the report narrative on mismatch.
    pub issue: String,
}

impl StepContext {
    pub fn new(index: usize, actor: Actor, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            index,
            actor,
            issue: format!("{} as {} did not behave as documented", label, actor),
            label,
        }
    }

    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.issue = issue.into();
        self
    }
}

/// Result of one recorded check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub expected: String,
    pub actual: String,
}

/// Collects the findings of one scenario.
pub struct Recorder {
    scenario: String,
    artifact_dir: Option<PathBuf>,
    findings: Vec<DefectReport>,
}

impl Recorder {
    pub fn new(scenario: impl Into<String>, artifact_dir: Option<PathBuf>) -> Self {
        Self {
            scenario: scenario.into(),
            artifact_dir,
            findings: Vec::new(),
        }
    }

    /// Defects recorded so far.
    pub fn findings(&self) -> &[DefectReport] {
        &self.findings
    }

    pub fn into_findings(self) -> Vec<DefectReport> {
        self.findings
    }

    /// Checks an observed outcome against an expected one.
    ///
    /// An [`Outcome::Unknown`] expectation always passes; what appeared is
    /// logged as discovered behavior.
    pub async fn record<D>(
        &mut self,
        driver: &D,
        ctx: &StepContext,
        expected: &Outcome,
        observed: &Observation,
        mode: AssertionMode,
    ) -> Result<Verdict>
    where
        D: PageDriver + ?Sized,
    {
        let actual = observed.outcome();
        if *expected == Outcome::Unknown {
            tracing::info!(
                scenario = %self.scenario,
                step = ctx.index,
                action = %ctx.label,
                observed = %observed.describe(),
                "discovered behavior"
            );
        }
        self.check(
            driver,
            ctx,
            expected.accepts(&actual),
            expected.to_string(),
            format!("{} ({})", actual, observed.describe()),
            mode,
        )
        .await
    }

    /// Checks a plain fact such as a status or a total.
    pub async fn record_fact<D>(
        &mut self,
        driver: &D,
        ctx: &StepContext,
        expected: &str,
        actual: &str,
        mode: AssertionMode,
    ) -> Result<Verdict>
    where
        D: PageDriver + ?Sized,
    {
        self.check(
            driver,
            ctx,
            expected == actual,
            expected.to_string(),
            actual.to_string(),
            mode,
        )
        .await
    }

    /// Records that the module disagreed with the workflow model.
    ///
    /// Returns the report so the caller can decide whether to abort.
    pub async fn divergence<D>(
        &mut self,
        driver: &D,
        ctx: &StepContext,
        predicted: String,
        actual: String,
    ) -> DefectReport
    where
        D: PageDriver + ?Sized,
    {
        let report = DefectReport {
            title: format!("{} diverged from the workflow model", ctx.label),
            expected: predicted,
            actual,
            narrative: ctx.issue.clone(),
            artifact: self.capture(driver, ctx).await,
        };
        tracing::warn!(
            scenario = %self.scenario,
            step = ctx.index,
            actor = %ctx.actor,
            "model divergence\n{}",
            report
        );
        self.findings.push(report.clone());
        report
    }

    async fn check<D>(
        &mut self,
        driver: &D,
        ctx: &StepContext,
        passed: bool,
        expected: String,
        actual: String,
        mode: AssertionMode,
    ) -> Result<Verdict>
    where
        D: PageDriver + ?Sized,
    {
        let verdict = Verdict {
            passed,
            expected,
            actual,
        };
        if passed {
            return Ok(verdict);
        }

        let report = DefectReport {
            title: format!("{} as {}", ctx.label, ctx.actor),
            expected: verdict.expected.clone(),
            actual: verdict.actual.clone(),
            narrative: ctx.issue.clone(),
            artifact: self.capture(driver, ctx).await,
        };
        tracing::warn!(
            scenario = %self.scenario,
            step = ctx.index,
            ?mode,
            "expectation not met\n{}",
            report
        );
        let rendered = report.to_string();
        self.findings.push(report);

        match mode {
            AssertionMode::Required => Err(Error::DiscoveredDefect(rendered)),
            AssertionMode::Discovery => Ok(verdict),
        }
    }

    /// Screenshot of the page at `<artifact_dir>/<scenario>/<step>.png`.
    async fn capture<D>(&self, driver: &D, ctx: &StepContext) -> Option<PathBuf>
    where
        D: PageDriver + ?Sized,
    {
        let dir = self.artifact_dir.as_ref()?;
        let path = dir
            .join(path_segment(&self.scenario))
            .join(format!("{:02}-{}.png", ctx.index, path_segment(&ctx.label)));
        match driver.screenshot(&path).await {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to capture screenshot");
                None
            }
        }
    }
}

fn path_segment(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Credentials, SimQuirks, SimulatedTimeModule, TimeModuleDriver};
    use crate::outcome::Candidate;

    async fn driver() -> crate::driver::SimDriver {
        let admin = Credentials::new("Admin", "admin123");
        let driver = SimulatedTimeModule::new(SimQuirks::strict(), &admin).driver();
        driver.login(&admin).await.unwrap();
        driver
    }

    fn duplicate_ctx() -> StepContext {
        StepContext::new(1, Actor::Supervisor, "create customer").with_issue(
            "'  ABC Corp 12  ' was saved although 'ABC Corp 12' already exists",
        )
    }

    #[test]
    fn report_renders_bug_format() {
        let report = DefectReport {
            title: "duplicate accepted".to_string(),
            expected: "\"Already exists\" error".to_string(),
            actual: "success".to_string(),
            narrative: "whitespace is not trimmed".to_string(),
            artifact: None,
        };
        assert_eq!(
            report.to_string(),
            "BUG: duplicate accepted\nExpected: \"Already exists\" error\nActual: success\nIssue: whitespace is not trimmed"
        );
    }

    #[tokio::test]
    async fn required_mismatch_is_an_error_with_report() {
        let driver = driver().await;
        let mut recorder = Recorder::new("duplicates", None);
        let observed = Observation::Matched(Candidate::success("Successfully Saved"));

        let err = recorder
            .record(
                &driver,
                &duplicate_ctx(),
                &Outcome::DuplicateError,
                &observed,
                AssertionMode::Required,
            )
            .await
            .unwrap_err();
        match err {
            Error::DiscoveredDefect(report) => {
                assert!(report.starts_with("BUG: create customer as supervisor"));
                assert!(report.contains("'  ABC Corp 12  '"));
                assert!(report.contains("'ABC Corp 12'"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(recorder.findings().len(), 1);
    }

    #[tokio::test]
    async fn discovery_mismatch_continues() {
        let driver = driver().await;
        let mut recorder = Recorder::new("duplicates", None);
        let observed = Observation::Matched(Candidate::success("Successfully Saved"));

        let verdict = recorder
            .record(
                &driver,
                &duplicate_ctx(),
                &Outcome::DuplicateError,
                &observed,
                AssertionMode::Discovery,
            )
            .await
            .unwrap();
        assert!(!verdict.passed);
        assert_eq!(recorder.findings().len(), 1);
    }

    #[tokio::test]
    async fn unknown_expectation_passes() {
        let driver = driver().await;
        let mut recorder = Recorder::new("discover", None);
        let verdict = recorder
            .record(
                &driver,
                &StepContext::new(0, Actor::Employee, "submit timesheet"),
                &Outcome::Unknown,
                &Observation::TimedOut,
                AssertionMode::Required,
            )
            .await
            .unwrap();
        assert!(verdict.passed);
        assert!(recorder.findings().is_empty());
    }

    #[tokio::test]
    async fn mismatch_captures_artifact() {
        let dir = tempfile::TempDir::new().unwrap();
        let driver = driver().await;
        let mut recorder = Recorder::new("Approved Locked", Some(dir.path().to_path_buf()));

        let verdict = recorder
            .record_fact(
                &driver,
                &StepContext::new(3, Actor::Employee, "edit available"),
                "false",
                "true",
                AssertionMode::Discovery,
            )
            .await
            .unwrap();
        assert!(!verdict.passed);

        let artifact = recorder.findings()[0].artifact.clone().unwrap();
        assert_eq!(
            artifact,
            dir.path().join("approved_locked").join("03-edit_available.png")
        );
        assert!(artifact.exists());
    }
}
