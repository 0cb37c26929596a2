//! Scenario runner.
//!
//! A scenario runs as one sequential pipeline: setup as the Supervisor, each
//! step awaited in order, then teardown on every exit path. Every step is
//! predicted by the workflow model before it is performed, and the module's
//! visible response is checked against both the step's expectation and the
//! prediction.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use crate::config::HarnessConfig;
use crate::debug;
use crate::driver::{Credentials, NavTarget, TimeModuleDriver};
use crate::error::{Error, Result};
use crate::fixture::{
    normalize_name, EmployeeIdentity, EntityKind, EntityModel, EntitySpec, FixtureFactory,
    SuffixRegistry,
};
use crate::messages;
use crate::outcome::{Candidate, Outcome};
use crate::workflow::{
    format_hours, Actor, Timesheet, TimesheetAction, TimesheetRow, TimesheetStatus,
    TransitionError, TransitionRecord,
};

use super::observe::{observe_outcome, Observation};
use super::recorder::{DefectReport, Recorder, StepContext};
use super::scenario::{Action, Scenario, Step};
use super::session::Sessions;

/// Settings for running scenarios.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub supervisor: Credentials,
    pub step_timeout: Duration,
    pub scenario_timeout: Duration,
    pub artifact_dir: Option<PathBuf>,
    pub max_name_len: usize,
}

impl From<&HarnessConfig> for RunnerConfig {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            supervisor: config.supervisor(),
            step_timeout: config.step_timeout(),
            scenario_timeout: config.scenario_timeout(),
            artifact_dir: config.artifact_dir(),
            max_name_len: config.max_name_len,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from(&HarnessConfig::default())
    }
}

/// Final verdict of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioVerdict {
    Passed,
    Failed,
    /// A scenario documenting a known defect failed, as it should.
    ExpectedFailure,
    /// A scenario documenting a known defect passed; the defect may be fixed.
    UnexpectedPass,
}

impl ScenarioVerdict {
    fn decide(failed: bool, expected_to_fail: bool) -> Self {
        match (failed, expected_to_fail) {
            (false, false) => ScenarioVerdict::Passed,
            (true, false) => ScenarioVerdict::Failed,
            (true, true) => ScenarioVerdict::ExpectedFailure,
            (false, true) => ScenarioVerdict::UnexpectedPass,
        }
    }

    /// Whether the verdict counts toward a green run.
    pub fn is_ok(self) -> bool {
        matches!(self, ScenarioVerdict::Passed | ScenarioVerdict::ExpectedFailure)
    }
}

/// What one step expected and saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub actor: Actor,
    pub action: String,
    pub expected: String,
    pub observed: String,
    pub passed: bool,
}

/// Result of running one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub run_id: Uuid,
    pub name: String,
    pub verdict: ScenarioVerdict,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Uniqueifier of the scenario's fixtures.
    pub suffix: u16,
    /// Another running scenario drew the same uniqueifier.
    pub collision_risk: bool,
    pub steps: Vec<StepRecord>,
    pub findings: Vec<DefectReport>,
    /// The error that ended the scenario early.
    pub error: Option<String>,
    pub transitions: Vec<TransitionRecord>,
    pub teardown_errors: Vec<String>,
}

struct RunState {
    factory: FixtureFactory,
    sessions: Sessions,
    recorder: Recorder,
    model: Timesheet,
    entities: EntityModel,
    employee: Option<EmployeeIdentity>,
    /// Kind and name of every entity this scenario saw saved.
    created: Vec<(EntityKind, String)>,
    steps: Vec<StepRecord>,
}

/// Runs scenarios against one page of the module.
pub struct ScenarioRunner<D> {
    driver: D,
    config: RunnerConfig,
    registry: SuffixRegistry,
}

impl<D: TimeModuleDriver> ScenarioRunner<D> {
    pub fn new(driver: D, config: RunnerConfig, registry: SuffixRegistry) -> Self {
        Self {
            driver,
            config,
            registry,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Runs a scenario to completion. Teardown runs whatever happened.
    pub async fn run(&self, scenario: &Scenario) -> ScenarioResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        tracing::info!(scenario = %scenario.name, %run_id, "running scenario");

        let mut state = RunState {
            factory: FixtureFactory::new(self.registry.clone()),
            sessions: Sessions::new(self.config.supervisor.clone()),
            recorder: Recorder::new(&scenario.name, self.config.artifact_dir.clone()),
            model: Timesheet::new(),
            entities: EntityModel::new(self.config.max_name_len),
            employee: None,
            created: Vec::new(),
            steps: Vec::new(),
        };
        let suffix = state.factory.suffix();
        let collision_risk = state.factory.collision_risk();

        let outcome = match tokio::time::timeout(
            self.config.scenario_timeout,
            self.execute(scenario, &mut state),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::ObservationTimeout {
                what: format!("scenario '{}'", scenario.name),
                after: self.config.scenario_timeout,
            }),
        };
        if let Err(e) = &outcome {
            tracing::warn!(scenario = %scenario.name, error = %e, "scenario aborted");
        }

        let teardown_errors = self.teardown(&mut state).await;

        let error = outcome.err().map(|e| e.to_string());
        let findings = state.recorder.into_findings();
        let verdict =
            ScenarioVerdict::decide(error.is_some() || !findings.is_empty(), scenario.expected_to_fail);

        match verdict {
            ScenarioVerdict::Passed | ScenarioVerdict::ExpectedFailure => {
                tracing::info!(scenario = %scenario.name, ?verdict, findings = findings.len(), "scenario finished")
            }
            _ => tracing::warn!(scenario = %scenario.name, ?verdict, findings = findings.len(), "scenario finished"),
        }

        ScenarioResult {
            run_id,
            name: scenario.name.clone(),
            verdict,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            suffix,
            collision_risk,
            steps: state.steps,
            findings,
            error,
            transitions: state.model.log().to_vec(),
            teardown_errors,
        }
    }

    async fn execute(&self, scenario: &Scenario, state: &mut RunState) -> Result<()> {
        scenario.check()?;
        self.setup(scenario, state).await?;

        for (index, step) in scenario.steps.iter().enumerate() {
            tracing::info!(
                scenario = %scenario.name,
                step = index,
                actor = %step.actor,
                action = %step.action.label(),
                "step"
            );
            self.run_step(index, step, state).await?;
        }
        Ok(())
    }

    /// Bounds one interaction with the module.
    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.config.step_timeout, fut)
            .await
            .map_err(|_| Error::ObservationTimeout {
                what: what.to_string(),
                after: self.config.step_timeout,
            })?
    }

    async fn observe(&self, candidates: &[Candidate]) -> Result<Observation> {
        observe_outcome(&self.driver, candidates, self.config.step_timeout).await
    }

    fn entity_candidates(&self) -> Vec<Candidate> {
        vec![
            Candidate::success(messages::SAVED),
            Candidate::duplicate(),
            Candidate::validation(messages::REQUIRED),
            Candidate::validation(messages::too_long(self.config.max_name_len)),
        ]
    }

    fn timesheet_candidates(action: TimesheetAction) -> Vec<Candidate> {
        let confirmation = match action {
            TimesheetAction::Save => messages::SAVED,
            TimesheetAction::Submit => messages::SUBMITTED,
            TimesheetAction::Approve => messages::TIMESHEET_APPROVED,
            TimesheetAction::Reject => messages::TIMESHEET_REJECTED,
        };
        vec![
            Candidate::success(confirmation),
            Candidate::validation(messages::EMPTY_TIMESHEET),
            Candidate::validation(messages::INVALID_HOURS),
            Candidate::validation(messages::EXCEEDS_DAILY_MAX),
            Candidate::validation(messages::REQUIRED),
        ]
    }

    /// Reads the status banner of the open timesheet.
    async fn observe_status(&self) -> Result<Option<TimesheetStatus>> {
        let candidates: Vec<Candidate> = TimesheetStatus::ALL
            .iter()
            .map(|s| Candidate::new(messages::status_banner(s), Outcome::Success))
            .collect();
        Ok(match self.observe(&candidates).await? {
            Observation::Matched(found) => TimesheetStatus::ALL
                .into_iter()
                .find(|s| messages::status_banner(s) == found.text),
            Observation::TimedOut => None,
        })
    }

    async fn create_fixture(
        &self,
        template: &EntitySpec,
        state: &mut RunState,
    ) -> Result<()> {
        let handle = state.factory.create(template, Actor::Supervisor);
        let page = NavTarget::for_entity(handle.kind);
        self.bounded("open fixture page", state.sessions.open(page, &self.driver))
            .await?;

        // Teardown looks for it even if no confirmation ever shows up.
        state.factory.mark_unconfirmed(&handle);
        match &handle.identity {
            Some(identity) => {
                self.bounded("create employee", self.driver.create_employee(identity))
                    .await?
            }
            None => {
                self.bounded("create fixture", self.driver.create_entity(&handle.spec))
                    .await?
            }
        }

        let observed = self.observe(&self.entity_candidates()).await?;
        if observed == Observation::TimedOut {
            return Err(Error::ObservationTimeout {
                what: format!("confirmation of fixture {} '{}'", handle.kind, handle.name()),
                after: self.config.step_timeout,
            });
        }
        if !observed.outcome().is_success() {
            state.factory.mark_absent(&handle);
            return Err(Error::driver(format!(
                "fixture {} '{}' was not created: {}",
                handle.kind,
                handle.name(),
                observed.describe()
            )));
        }
        state.factory.mark_created(&handle);

        if let Some(identity) = &handle.identity {
            state.sessions.set_employee(Credentials::from(identity));
            state.employee = Some(identity.clone());
        } else {
            state.entities.created(&handle.spec);
            state.created.push((handle.kind, handle.spec.name.clone()));
        }
        Ok(())
    }

    async fn setup(&self, scenario: &Scenario, state: &mut RunState) -> Result<()> {
        self.bounded(
            "supervisor login",
            state.sessions.act_as(Actor::Supervisor, &self.driver),
        )
        .await?;

        if let Some(employee) = &scenario.employee {
            self.create_fixture(employee, state).await?;
        }
        for fixture in &scenario.fixtures {
            self.create_fixture(fixture, state).await?;
        }
        tracing::debug!(
            scenario = %scenario.name,
            fixtures = state.factory.pending().len(),
            "setup complete"
        );
        Ok(())
    }

    async fn run_step(&self, index: usize, step: &Step, state: &mut RunState) -> Result<()> {
        self.bounded("switch actor", state.sessions.act_as(step.actor, &self.driver))
            .await?;
        let ctx = StepContext::new(index, step.actor, step.action.label());

        match &step.action {
            Action::CreateEntity { entity } => self.create_entity(ctx, step, entity, state).await,
            Action::SaveTimesheet { rows } => {
                self.transition(ctx, step, TimesheetAction::Save, Some(rows.clone()), None, state)
                    .await
            }
            Action::SubmitTimesheet => {
                self.transition(ctx, step, TimesheetAction::Submit, None, None, state)
                    .await
            }
            Action::ApproveTimesheet => {
                self.transition(ctx, step, TimesheetAction::Approve, None, None, state)
                    .await
            }
            Action::RejectTimesheet { comment } => {
                self.transition(
                    ctx,
                    step,
                    TimesheetAction::Reject,
                    None,
                    comment.as_deref(),
                    state,
                )
                .await
            }
            Action::ExpectEditUnavailable => self.expect_edit_unavailable(ctx, step, state).await,
            Action::ExpectStatus { status } => self.expect_status(ctx, step, *status, state).await,
            Action::ExpectTotalHours { total } => {
                self.expect_total_hours(ctx, step, total, state).await
            }
            Action::ExpectStoredName { kind, name } => {
                self.expect_stored_name(ctx, step, *kind, name, state).await
            }
        }
    }

    async fn create_entity(
        &self,
        ctx: StepContext,
        step: &Step,
        template: &EntitySpec,
        state: &mut RunState,
    ) -> Result<()> {
        let handle = state.factory.create(template, step.actor);
        let spec = handle.spec.clone();

        let predicted = state.entities.predict_create(&spec);
        if let Outcome::ValidationError(message) = &predicted {
            if step.expect.is_success() {
                return Err(Error::GuardViolation {
                    action: ctx.label.clone(),
                    message: message.clone(),
                });
            }
        }

        let earlier = state
            .created
            .iter()
            .find(|(kind, name)| *kind == spec.kind && normalize_name(name) == normalize_name(&spec.name))
            .map(|(_, name)| name.clone());
        let ctx = match earlier {
            Some(first) => ctx.with_issue(format!(
                "'{}' was submitted after '{}' had been saved; names equal after trimming must be refused as duplicates",
                spec.name, first
            )),
            None => ctx.with_issue(format!(
                "creating {} '{}' did not show the documented result",
                spec.kind, spec.name
            )),
        };

        self.bounded(
            "open entity page",
            state.sessions.open(NavTarget::for_entity(spec.kind), &self.driver),
        )
        .await?;
        state.factory.mark_unconfirmed(&handle);
        self.bounded("create entity", self.driver.create_entity(&spec))
            .await?;
        let observed = self.observe(&self.entity_candidates()).await?;

        match &observed {
            Observation::Matched(found) if found.outcome.is_success() => {
                state.factory.mark_created(&handle);
                state.entities.created(&spec);
                state.created.push((spec.kind, spec.name.clone()));
            }
            Observation::Matched(_) => state.factory.mark_absent(&handle),
            Observation::TimedOut => {}
        }
        self.settle(&ctx, step, &predicted, &observed, state).await
    }

    async fn transition(
        &self,
        ctx: StepContext,
        step: &Step,
        action: TimesheetAction,
        rows: Option<Vec<TimesheetRow>>,
        comment: Option<&str>,
        state: &mut RunState,
    ) -> Result<()> {
        let rows = rows.map(|rows| {
            rows.into_iter()
                .map(|row| TimesheetRow {
                    project: state.factory.resolve(EntityKind::Project, &row.project),
                    ..row
                })
                .collect::<Vec<_>>()
        });
        let from = state.model.status();
        let prediction = state.model.predict(step.actor, action, rows.as_deref());
        let predicted = match &prediction {
            Ok(_) => Outcome::Success,
            Err(TransitionError::Guard { failure, .. }) if !step.expect.is_success() => {
                Outcome::ValidationError(failure.message().to_string())
            }
            Err(err) => return Err(err.clone().into()),
        };

        match action {
            TimesheetAction::Save | TimesheetAction::Submit => {
                self.bounded(
                    "open my timesheets",
                    state.sessions.open(NavTarget::MyTimesheets, &self.driver),
                )
                .await?;
            }
            TimesheetAction::Approve | TimesheetAction::Reject => {
                self.bounded(
                    "open employee timesheets",
                    state.sessions.open(NavTarget::EmployeeTimesheets, &self.driver),
                )
                .await?;
            }
        }

        match action {
            TimesheetAction::Save => {
                let rows = rows.as_deref().unwrap_or_default();
                self.bounded("save timesheet", self.driver.save_timesheet(rows))
                    .await?
            }
            TimesheetAction::Submit => {
                self.bounded("submit timesheet", self.driver.submit_timesheet())
                    .await?
            }
            TimesheetAction::Approve => {
                let employee = employee_name(state)?;
                self.bounded(
                    "approve timesheet",
                    self.driver.approve_timesheet(&employee),
                )
                .await?
            }
            TimesheetAction::Reject => {
                let employee = employee_name(state)?;
                self.bounded(
                    "reject timesheet",
                    self.driver.reject_timesheet(&employee, comment),
                )
                .await?
            }
        }

        let observed = self.observe(&Self::timesheet_candidates(action)).await?;
        let applied = observed.outcome().is_success() && prediction.is_ok();
        if applied {
            state.model.apply(step.actor, action, rows)?;
        }
        let ctx = ctx.with_issue(format!(
            "{} as {} from {} did not show the documented result",
            action, step.actor, from
        ));
        self.settle(&ctx, step, &predicted, &observed, state).await?;

        if applied {
            let shown = self.observe_status().await?;
            if shown != Some(state.model.status()) {
                let actual = shown
                    .map(|s| messages::status_banner(s))
                    .unwrap_or_else(|| "no status banner".to_string());
                self.diverged(
                    &ctx,
                    step,
                    messages::status_banner(state.model.status()),
                    actual,
                    state,
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn expect_edit_unavailable(
        &self,
        ctx: StepContext,
        step: &Step,
        state: &mut RunState,
    ) -> Result<()> {
        self.bounded(
            "open my timesheets",
            state.sessions.open(NavTarget::MyTimesheets, &self.driver),
        )
        .await?;
        let available = self
            .bounded("check edit control", self.driver.edit_available())
            .await?;

        let describe = |available: bool| {
            if available {
                "Edit available".to_string()
            } else {
                "Edit unavailable".to_string()
            }
        };
        let ctx = ctx.with_issue(format!(
            "the employee can still edit a timesheet in status {}",
            state.model.status()
        ));
        self.check_fact(
            &ctx,
            step,
            describe(false),
            describe(available),
            describe(state.model.status().is_editable()),
            state,
        )
        .await
    }

    async fn expect_status(
        &self,
        ctx: StepContext,
        step: &Step,
        expected: TimesheetStatus,
        state: &mut RunState,
    ) -> Result<()> {
        match step.actor {
            Actor::Employee => {
                self.bounded(
                    "open my timesheets",
                    state.sessions.open(NavTarget::MyTimesheets, &self.driver),
                )
                .await?;
            }
            Actor::Supervisor => {
                let employee = employee_name(state)?;
                self.bounded(
                    "open employee timesheets",
                    state.sessions.open(NavTarget::EmployeeTimesheets, &self.driver),
                )
                .await?;
                self.bounded("select employee", self.driver.fill_field("employee", &employee))
                    .await?;
                self.bounded("view timesheet", self.driver.click_control("View"))
                    .await?;
            }
        }

        let shown = self
            .observe_status()
            .await?
            .map(|s| s.to_string())
            .unwrap_or_else(|| "no status banner".to_string());
        let ctx = ctx.with_issue(format!("the timesheet should read \"Status: {}\"", expected));
        self.check_fact(
            &ctx,
            step,
            expected.to_string(),
            shown,
            state.model.status().to_string(),
            state,
        )
        .await
    }

    async fn expect_total_hours(
        &self,
        ctx: StepContext,
        step: &Step,
        expected: &str,
        state: &mut RunState,
    ) -> Result<()> {
        self.bounded(
            "open my timesheets",
            state.sessions.open(NavTarget::MyTimesheets, &self.driver),
        )
        .await?;
        let shown = self
            .bounded("read total hours", self.driver.total_hours())
            .await?
            .unwrap_or_else(|| "no total".to_string());
        let ctx = ctx.with_issue("the grand total should add every day of every row".to_string());
        self.check_fact(
            &ctx,
            step,
            expected.to_string(),
            shown,
            format_hours(state.model.total_minutes()),
            state,
        )
        .await
    }

    /// Reopens an entity and reads back the name the module stored.
    async fn expect_stored_name(
        &self,
        ctx: StepContext,
        step: &Step,
        kind: EntityKind,
        name: &str,
        state: &mut RunState,
    ) -> Result<()> {
        let submitted = state.factory.resolve(kind, name);
        let expected = normalize_name(&submitted);
        self.bounded(
            "open entity page",
            state.sessions.open(NavTarget::for_entity(kind), &self.driver),
        )
        .await?;

        let stored = match self
            .bounded("open entity", self.driver.open_entity(kind, &expected))
            .await
        {
            Ok(()) => {
                self.bounded("read stored name", self.driver.get_value("name"))
                    .await?
            }
            Err(Error::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        let actual = stored
            .map(|stored| format!("'{}'", stored))
            .unwrap_or_else(|| format!("no stored {}", kind));
        let ctx = ctx.with_issue(format!(
            "'{}' should be stored as '{}'",
            submitted, expected
        ));
        let expected = format!("'{}'", expected);
        self.check_fact(&ctx, step, expected.clone(), actual, expected, state)
            .await
    }

    /// Records an observed outcome, then compares it with the prediction.
    async fn settle(
        &self,
        ctx: &StepContext,
        step: &Step,
        predicted: &Outcome,
        observed: &Observation,
        state: &mut RunState,
    ) -> Result<()> {
        if *observed == Observation::TimedOut && step.expect != Outcome::Unknown {
            return Err(Error::ObservationTimeout {
                what: format!("outcome of {}", ctx.label),
                after: self.config.step_timeout,
            });
        }

        let actual = observed.outcome();
        let passed = step.expect.accepts(&actual);
        state.steps.push(StepRecord {
            index: ctx.index,
            actor: ctx.actor,
            action: ctx.label.clone(),
            expected: step.expect.to_string(),
            observed: observed.describe(),
            passed,
        });
        state
            .recorder
            .record(&self.driver, ctx, &step.expect, observed, step.mode)
            .await?;

        if passed && !predicted.accepts(&actual) {
            self.diverged(ctx, step, predicted.to_string(), actual.to_string(), state)
                .await?;
        }
        Ok(())
    }

    /// Records a checked fact, then compares it with the model's value.
    async fn check_fact(
        &self,
        ctx: &StepContext,
        step: &Step,
        expected: String,
        actual: String,
        predicted: String,
        state: &mut RunState,
    ) -> Result<()> {
        let passed = expected == actual;
        state.steps.push(StepRecord {
            index: ctx.index,
            actor: ctx.actor,
            action: ctx.label.clone(),
            expected: expected.clone(),
            observed: actual.clone(),
            passed,
        });
        state
            .recorder
            .record_fact(&self.driver, ctx, &expected, &actual, step.mode)
            .await?;

        if passed && predicted != actual {
            self.diverged(ctx, step, predicted, actual, state).await?;
        }
        Ok(())
    }

    async fn diverged(
        &self,
        ctx: &StepContext,
        step: &Step,
        predicted: String,
        actual: String,
        state: &mut RunState,
    ) -> Result<()> {
        let report = state
            .recorder
            .divergence(&self.driver, ctx, predicted, actual)
            .await;
        if step.continue_on_divergence {
            Ok(())
        } else {
            Err(Error::DiscoveredDefect(report.to_string()))
        }
    }

    /// Deletes the scenario's fixtures as their creators, then logs out.
    ///
    /// Failures are collected and logged; they never change the verdict.
    async fn teardown(&self, state: &mut RunState) -> Vec<String> {
        let mut errors = Vec::new();

        for owner in [Actor::Employee, Actor::Supervisor] {
            let count = state
                .factory
                .pending()
                .iter()
                .filter(|h| h.owner == owner)
                .count();
            if count == 0 {
                continue;
            }
            if let Err(e) = self
                .bounded("teardown login", state.sessions.act_as(owner, &self.driver))
                .await
            {
                errors.push(e.to_string());
                continue;
            }
            let budget = self.config.step_timeout * count as u32;
            match tokio::time::timeout(budget, state.factory.cleanup_all(owner, &self.driver)).await
            {
                Ok(failures) => errors.extend(failures.into_iter().map(|e| e.to_string())),
                Err(_) => errors.push(format!("cleanup as {} timed out after {:?}", owner, budget)),
            }
        }

        if let Err(e) = self
            .bounded("logout", state.sessions.close(&self.driver))
            .await
        {
            errors.push(e.to_string());
        }

        for error in &errors {
            tracing::warn!(error = %error, "teardown failure");
        }
        errors
    }
}

fn employee_name(state: &RunState) -> Result<String> {
    state
        .employee
        .as_ref()
        .map(EmployeeIdentity::full_name)
        .ok_or_else(|| Error::Session("scenario has no employee identity".to_string()))
}

/// Runs independent scenarios concurrently, one driver each.
///
/// All scenarios share one [`SuffixRegistry`]. With `HARNESS_FAIL_FAST`
/// set they run one at a time and the suite stops at the first failure.
/// Results come back in input order, one per scenario; a scenario whose
/// task panicked is reported as failed.
pub async fn run_suite<D, F>(
    scenarios: Vec<Scenario>,
    config: RunnerConfig,
    make_driver: F,
) -> Vec<ScenarioResult>
where
    D: TimeModuleDriver + 'static,
    F: Fn() -> D,
{
    let registry = SuffixRegistry::new();

    if debug::is_fail_fast() {
        let mut results = Vec::new();
        for scenario in &scenarios {
            let runner = ScenarioRunner::new(make_driver(), config.clone(), registry.clone());
            let result = runner.run(scenario).await;
            let stop = !result.verdict.is_ok();
            results.push(result);
            if stop {
                tracing::warn!(scenario = %scenario.name, "fail-fast: stopping suite");
                break;
            }
        }
        return results;
    }

    let tasks: Vec<(String, JoinHandle<ScenarioResult>)> = scenarios
        .into_iter()
        .map(|scenario| {
            let runner = ScenarioRunner::new(make_driver(), config.clone(), registry.clone());
            let name = scenario.name.clone();
            (name, tokio::spawn(async move { runner.run(&scenario).await }))
        })
        .collect();

    let mut results = Vec::with_capacity(tasks.len());
    for (name, task) in tasks {
        match task.await {
            Ok(result) => results.push(result),
            Err(e) => {
                tracing::error!(scenario = %name, error = %e, "scenario task failed");
                results.push(aborted_result(name, e));
            }
        }
    }
    results
}

fn aborted_result(name: String, err: JoinError) -> ScenarioResult {
    let reason = if err.is_cancelled() {
        "scenario task was cancelled".to_string()
    } else {
        let payload = err.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown cause".to_string());
        format!("scenario task panicked: {}", message)
    };
    ScenarioResult {
        run_id: Uuid::new_v4(),
        name,
        verdict: ScenarioVerdict::Failed,
        started_at: Utc::now(),
        duration_ms: 0,
        suffix: 0,
        collision_risk: false,
        steps: Vec::new(),
        findings: Vec::new(),
        error: Some(reason),
        transitions: Vec::new(),
        teardown_errors: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{PageDriver, SimDriver, SimQuirks, SimulatedTimeModule};
    use crate::harness::report::Summary;
    use crate::workflow::Day;
    use async_trait::async_trait;
    use std::path::Path;

    fn config() -> RunnerConfig {
        RunnerConfig {
            step_timeout: Duration::from_millis(300),
            artifact_dir: None,
            ..RunnerConfig::default()
        }
    }

    fn runner(quirks: SimQuirks) -> (SimulatedTimeModule, ScenarioRunner<SimDriver>) {
        let config = config();
        let app = SimulatedTimeModule::new(quirks, &config.supervisor);
        let runner = ScenarioRunner::new(app.driver(), config, SuffixRegistry::new());
        (app, runner)
    }

    fn with_timesheet_fixtures(scenario: Scenario) -> Scenario {
        scenario
            .with_employee(EntitySpec::employee("employee", "Secret1!"))
            .with_fixture(EntitySpec::customer("ACME"))
            .with_fixture(
                EntitySpec::project("ACME Web", "ACME").with_activities(vec!["Development".to_string()]),
            )
    }

    fn rows() -> Vec<TimesheetRow> {
        vec![TimesheetRow::new("ACME Web", "Development")
            .with_hours(Day::Mon, "4")
            .with_hours(Day::Tue, "4")]
    }

    #[test]
    fn verdict_table() {
        assert_eq!(ScenarioVerdict::decide(false, false), ScenarioVerdict::Passed);
        assert_eq!(ScenarioVerdict::decide(true, false), ScenarioVerdict::Failed);
        assert_eq!(ScenarioVerdict::decide(true, true), ScenarioVerdict::ExpectedFailure);
        assert_eq!(ScenarioVerdict::decide(false, true), ScenarioVerdict::UnexpectedPass);
        assert!(ScenarioVerdict::ExpectedFailure.is_ok());
        assert!(!ScenarioVerdict::UnexpectedPass.is_ok());
    }

    #[tokio::test]
    async fn predicted_illegal_transition_aborts_and_tears_down() {
        let (app, runner) = runner(SimQuirks::strict());
        let scenario = with_timesheet_fixtures(Scenario::new("approve unsubmitted"))
            .step(Step::new(Actor::Supervisor, Action::ApproveTimesheet));

        let result = runner.run(&scenario).await;
        assert_eq!(result.verdict, ScenarioVerdict::Failed);
        assert!(result.error.unwrap().contains("illegal transition"));
        assert!(result.transitions.is_empty());
        assert!(result.teardown_errors.is_empty());
        assert!(app.entity_names(EntityKind::Customer).await.is_empty());
        assert!(app.entity_names(EntityKind::Project).await.is_empty());
    }

    #[tokio::test]
    async fn guard_violation_with_success_expectation_aborts() {
        let (_app, runner) = runner(SimQuirks::strict());
        let scenario = with_timesheet_fixtures(Scenario::new("submit empty, expecting success"))
            .step(Step::new(Actor::Employee, Action::SubmitTimesheet));

        let result = runner.run(&scenario).await;
        assert_eq!(result.verdict, ScenarioVerdict::Failed);
        assert!(result.error.unwrap().contains("guard violation"));
        assert!(result.steps.is_empty());
    }

    #[tokio::test]
    async fn status_follows_the_model_through_rejection() {
        let (app, runner) = runner(SimQuirks::strict());
        let scenario = with_timesheet_fixtures(Scenario::new("rejection"))
            .step(Step::new(Actor::Employee, Action::SaveTimesheet { rows: rows() }))
            .step(Step::new(Actor::Employee, Action::SubmitTimesheet))
            .step(Step::new(
                Actor::Supervisor,
                Action::RejectTimesheet {
                    comment: Some("split by activity".to_string()),
                },
            ))
            .step(Step::new(
                Actor::Supervisor,
                Action::ExpectStatus {
                    status: TimesheetStatus::Rejected,
                },
            ));

        let result = runner.run(&scenario).await;
        assert_eq!(result.verdict, ScenarioVerdict::Passed, "{:?}", result.error);
        let path: Vec<_> = result.transitions.iter().map(|t| t.to).collect();
        assert_eq!(
            path,
            vec![
                TimesheetStatus::NotSubmitted,
                TimesheetStatus::Submitted,
                TimesheetStatus::Rejected
            ]
        );
        assert!(app.entity_names(EntityKind::Activity).await.is_empty());
    }

    #[tokio::test]
    async fn discovery_step_records_and_continues() {
        let (_app, runner) = runner(SimQuirks::observed());
        let scenario = Scenario::new("padded duplicate, discovery")
            .with_fixture(EntitySpec::customer("ABC Corp"))
            .step(
                Step::new(
                    Actor::Supervisor,
                    Action::CreateEntity {
                        entity: EntitySpec::customer("  ABC Corp  "),
                    },
                )
                .expect(Outcome::DuplicateError)
                .discovery(),
            )
            .step(Step::new(
                Actor::Supervisor,
                Action::CreateEntity {
                    entity: EntitySpec::customer("Other Co"),
                },
            ))
            .expected_to_fail();

        let result = runner.run(&scenario).await;
        assert_eq!(result.verdict, ScenarioVerdict::ExpectedFailure);
        assert!(result.error.is_none());
        assert_eq!(result.steps.len(), 2);
        assert!(!result.steps[0].passed);
        assert!(result.steps[1].passed);
        assert_eq!(result.findings.len(), 1);
    }

    fn slow_runner() -> (SimulatedTimeModule, ScenarioRunner<SimDriver>) {
        let config = RunnerConfig {
            step_timeout: Duration::from_millis(100),
            ..config()
        };
        let app = SimulatedTimeModule::new(SimQuirks::strict(), &config.supervisor)
            .with_latency(Duration::from_millis(250));
        let runner = ScenarioRunner::new(app.driver(), config, SuffixRegistry::new());
        (app, runner)
    }

    #[tokio::test]
    async fn unconfirmed_step_times_out_and_is_torn_down() {
        let (app, runner) = slow_runner();
        let scenario = Scenario::new("slow create")
            .step(Step::new(
                Actor::Supervisor,
                Action::CreateEntity {
                    entity: EntitySpec::customer("Slow Co"),
                },
            ))
            .step(Step::new(
                Actor::Supervisor,
                Action::CreateEntity {
                    entity: EntitySpec::customer("Never Reached"),
                },
            ));

        let result = runner.run(&scenario).await;
        assert_eq!(result.verdict, ScenarioVerdict::Failed);
        let error = result.error.unwrap();
        assert!(error.contains("timed out after"), "{}", error);
        assert!(result.steps.is_empty());
        assert!(result.teardown_errors.is_empty(), "{:?}", result.teardown_errors);
        assert!(app.entity_names(EntityKind::Customer).await.is_empty());
    }

    #[tokio::test]
    async fn unconfirmed_fixture_times_out_and_is_torn_down() {
        let (app, runner) = slow_runner();
        let scenario = Scenario::new("slow fixture")
            .with_fixture(EntitySpec::customer("Slow Co"))
            .step(Step::new(
                Actor::Supervisor,
                Action::CreateEntity {
                    entity: EntitySpec::customer("Never Reached"),
                },
            ));

        let result = runner.run(&scenario).await;
        assert_eq!(result.verdict, ScenarioVerdict::Failed);
        let error = result.error.unwrap();
        assert!(error.contains("confirmation of fixture customer"), "{}", error);
        assert!(result.teardown_errors.is_empty(), "{:?}", result.teardown_errors);
        assert!(app.entity_names(EntityKind::Customer).await.is_empty());
    }

    #[tokio::test]
    async fn refused_fixture_leaves_nothing_to_delete() {
        let (app, runner) = runner(SimQuirks::strict());
        let scenario = Scenario::new("refused fixture")
            .with_fixture(EntitySpec::customer("").exact())
            .step(Step::new(
                Actor::Supervisor,
                Action::CreateEntity {
                    entity: EntitySpec::customer("Never Reached"),
                },
            ));

        let result = runner.run(&scenario).await;
        assert_eq!(result.verdict, ScenarioVerdict::Failed);
        assert!(result.error.unwrap().contains("was not created"));
        assert!(result.teardown_errors.is_empty(), "{:?}", result.teardown_errors);
        assert!(app.entity_names(EntityKind::Customer).await.is_empty());
    }

    #[tokio::test]
    async fn stored_name_is_read_back_trimmed() {
        let (app, runner) = runner(SimQuirks::observed());
        let scenario = Scenario::new("padded name")
            .step(Step::new(
                Actor::Supervisor,
                Action::CreateEntity {
                    entity: EntitySpec::customer("  Trim Co  "),
                },
            ))
            .step(Step::new(
                Actor::Supervisor,
                Action::ExpectStoredName {
                    kind: EntityKind::Customer,
                    name: "  Trim Co  ".to_string(),
                },
            ));

        let result = runner.run(&scenario).await;
        assert_eq!(result.verdict, ScenarioVerdict::Passed, "{:?}", result.error);
        assert_eq!(result.steps.len(), 2);
        let expected = format!("'Trim Co {}'", result.suffix);
        assert_eq!(result.steps[1].expected, expected);
        assert_eq!(result.steps[1].observed, expected);
        assert!(app.entity_names(EntityKind::Customer).await.is_empty());
    }

    #[tokio::test]
    async fn missing_stored_entity_fails_the_check() {
        let (_app, runner) = runner(SimQuirks::strict());
        let scenario = Scenario::new("never created").step(Step::new(
            Actor::Supervisor,
            Action::ExpectStoredName {
                kind: EntityKind::Project,
                name: "Ghost".to_string(),
            },
        ));

        let result = runner.run(&scenario).await;
        assert_eq!(result.verdict, ScenarioVerdict::Failed);
        assert_eq!(result.steps[0].observed, "no stored project");
        assert!(!result.steps[0].passed);
    }

    struct PanickingDriver;

    #[async_trait]
    impl PageDriver for PanickingDriver {
        async fn navigate(&self, _target: NavTarget) -> Result<()> {
            panic!("page crashed")
        }
        async fn fill_field(&self, _field: &str, _value: &str) -> Result<()> {
            panic!("page crashed")
        }
        async fn click_control(&self, _control: &str) -> Result<()> {
            panic!("page crashed")
        }
        async fn is_visible(&self, _text: &str) -> Result<bool> {
            panic!("page crashed")
        }
        async fn get_value(&self, _field: &str) -> Result<Option<String>> {
            panic!("page crashed")
        }
        async fn screenshot(&self, _path: &Path) -> Result<()> {
            panic!("page crashed")
        }
        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[async_trait]
    impl TimeModuleDriver for PanickingDriver {
        async fn login(&self, _credentials: &Credentials) -> Result<()> {
            panic!("login crashed")
        }
        async fn logout(&self) -> Result<()> {
            panic!("page crashed")
        }
        async fn create_entity(&self, _spec: &EntitySpec) -> Result<()> {
            panic!("page crashed")
        }
        async fn create_employee(&self, _identity: &EmployeeIdentity) -> Result<()> {
            panic!("page crashed")
        }
        async fn open_entity(&self, _kind: EntityKind, _name: &str) -> Result<()> {
            panic!("page crashed")
        }
        async fn delete_entity(&self, _kind: EntityKind, _name: &str) -> Result<()> {
            panic!("page crashed")
        }
        async fn save_timesheet(&self, _rows: &[TimesheetRow]) -> Result<()> {
            panic!("page crashed")
        }
        async fn submit_timesheet(&self) -> Result<()> {
            panic!("page crashed")
        }
        async fn approve_timesheet(&self, _employee: &str) -> Result<()> {
            panic!("page crashed")
        }
        async fn reject_timesheet(&self, _employee: &str, _comment: Option<&str>) -> Result<()> {
            panic!("page crashed")
        }
        async fn edit_available(&self) -> Result<bool> {
            panic!("page crashed")
        }
        async fn total_hours(&self) -> Result<Option<String>> {
            panic!("page crashed")
        }
    }

    #[tokio::test]
    async fn panicked_scenarios_are_reported_failed() {
        let scenarios = vec![
            Scenario::new("first").step(Step::new(Actor::Supervisor, Action::ExpectEditUnavailable)),
            Scenario::new("second").step(Step::new(Actor::Supervisor, Action::ExpectEditUnavailable)),
        ];

        let results = run_suite(scenarios, config(), || PanickingDriver).await;
        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        for result in &results {
            assert_eq!(result.verdict, ScenarioVerdict::Failed);
            let error = result.error.as_deref().unwrap_or_default();
            assert!(error.contains("panicked: login crashed"), "{}", error);
        }
        assert_eq!(Summary::of(&results).exit_code(), 1);
    }

    #[tokio::test]
    async fn suite_runs_in_parallel_and_keeps_order() {
        let config = config();
        let app = SimulatedTimeModule::new(SimQuirks::strict(), &config.supervisor);
        let scenarios = vec![
            Scenario::new("first").step(Step::new(
                Actor::Supervisor,
                Action::CreateEntity {
                    entity: EntitySpec::customer("Parallel One"),
                },
            )),
            Scenario::new("second").step(Step::new(
                Actor::Supervisor,
                Action::CreateEntity {
                    entity: EntitySpec::customer("Parallel Two"),
                },
            )),
        ];

        let results = run_suite(scenarios, config, || app.driver()).await;
        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(results.iter().all(|r| r.verdict == ScenarioVerdict::Passed));
        assert!(app.entity_names(EntityKind::Customer).await.is_empty());
    }
}
