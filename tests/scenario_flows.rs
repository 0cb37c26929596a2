//! Scenario integration tests against the simulated Time module.
//!
//! Run with: `cargo test --test scenario_flows`
//!
//! Environment variables:
//! - `HARNESS_DEBUG=1` - Log every poll while observing page text

use std::path::{Path, PathBuf};
use std::time::Duration;

use workflow_harness::driver::{SimQuirks, SimulatedTimeModule};
use workflow_harness::fixture::{
    CustomerData, EntityKind, EntitySpec, FixtureFactory, ProjectData, SuffixRegistry,
    TestCaseSet, TimesheetData,
};
use workflow_harness::harness::{
    customer_scenario, project_scenario, render_text, run_suite, timesheet_scenario, Action,
    RunnerConfig, Scenario, ScenarioResult, ScenarioRunner, ScenarioVerdict, Step, Summary,
    KNOWN_DEFECTS,
};
use workflow_harness::workflow::{Actor, TimesheetStatus};

fn tests_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests")
}

fn config() -> RunnerConfig {
    RunnerConfig {
        step_timeout: Duration::from_millis(500),
        artifact_dir: None,
        ..RunnerConfig::default()
    }
}

fn app(quirks: SimQuirks) -> SimulatedTimeModule {
    SimulatedTimeModule::new(quirks, &config().supervisor)
}

async fn run_one(app: &SimulatedTimeModule, scenario: &Scenario) -> ScenarioResult {
    let runner = ScenarioRunner::new(app.driver(), config(), SuffixRegistry::new());
    runner.run(scenario).await
}

fn load(name: &str) -> Scenario {
    Scenario::load(tests_dir().join("scenarios").join(name)).expect("failed to load scenario")
}

fn catalog(dir: &Path) -> Vec<Scenario> {
    let max = config().max_name_len;
    let mut scenarios = Vec::new();

    let customers = TestCaseSet::<CustomerData>::load(dir.join("customers_data.json")).unwrap();
    for id in customers.ids() {
        scenarios.push(customer_scenario(customers.get(id).unwrap(), max));
    }
    let projects = TestCaseSet::<ProjectData>::load(dir.join("projects_data.json")).unwrap();
    for id in projects.ids() {
        scenarios.push(project_scenario(projects.get(id).unwrap(), max));
    }
    let timesheets = TestCaseSet::<TimesheetData>::load(dir.join("timesheet_data.json")).unwrap();
    for id in timesheets.ids() {
        scenarios.push(timesheet_scenario(timesheets.get(id).unwrap()));
    }
    scenarios
}

async fn assert_no_leftovers(app: &SimulatedTimeModule) {
    for kind in [EntityKind::Customer, EntityKind::Project, EntityKind::Activity] {
        let left = app.entity_names(kind).await;
        assert!(left.is_empty(), "{} left behind: {:?}", kind, left);
    }
}

#[tokio::test]
async fn approval_flow_reaches_approved_and_locks_editing() {
    let app = app(SimQuirks::strict());
    let result = run_one(&app, &load("approval_flow.yaml")).await;

    assert_eq!(result.verdict, ScenarioVerdict::Passed, "{:?}", result.error);
    let path: Vec<_> = result.transitions.iter().map(|t| t.to).collect();
    assert_eq!(
        path,
        vec![
            TimesheetStatus::NotSubmitted,
            TimesheetStatus::Submitted,
            TimesheetStatus::Approved
        ]
    );
    assert!(result.steps.iter().all(|s| s.passed));
    assert!(result.findings.is_empty());
    assert_no_leftovers(&app).await;
}

#[tokio::test]
async fn empty_submission_is_refused_without_transition() {
    let app = app(SimQuirks::strict());
    let result = run_one(&app, &load("empty_submission.yaml")).await;

    assert_eq!(result.verdict, ScenarioVerdict::Passed, "{:?}", result.error);
    assert!(result.transitions.is_empty());
}

#[tokio::test]
async fn empty_submission_expected_to_succeed_is_a_guard_violation() {
    let app = app(SimQuirks::strict());
    let scenario = Scenario::new("empty submission, expecting success")
        .with_employee(EntitySpec::employee("employee", "Secret1!"))
        .step(Step::new(Actor::Employee, Action::SubmitTimesheet));

    let result = run_one(&app, &scenario).await;
    assert_eq!(result.verdict, ScenarioVerdict::Failed);
    assert!(result.error.unwrap().contains("guard violation"));
    assert!(result
        .transitions
        .iter()
        .all(|t| t.to != TimesheetStatus::Submitted));
}

#[tokio::test]
async fn padded_duplicate_is_reported_with_both_names() {
    let app = app(SimQuirks::observed());
    let result = run_one(&app, &load("padded_duplicate.yaml")).await;

    assert_eq!(result.verdict, ScenarioVerdict::ExpectedFailure);
    assert_eq!(result.findings.len(), 1);
    let narrative = &result.findings[0].narrative;
    assert!(narrative.contains(&format!("'  ABC Corp {}  '", result.suffix)));
    assert!(narrative.contains(&format!("'ABC Corp {}'", result.suffix)));
    assert!(render_text(&[result.clone()]).contains("BUG: create customer as supervisor"));
    assert_no_leftovers(&app).await;
}

#[tokio::test]
async fn padded_duplicate_passes_once_names_are_trimmed() {
    let app = app(SimQuirks::strict());
    let result = run_one(&app, &load("padded_duplicate.yaml")).await;

    assert_eq!(result.verdict, ScenarioVerdict::UnexpectedPass);
    assert!(result.findings.is_empty());
}

#[tokio::test]
async fn catalog_against_observed_module_is_green() {
    let app = app(SimQuirks::observed());
    let scenarios = catalog(&tests_dir().join("data"));
    let total = scenarios.len();

    let results = run_suite(scenarios, config(), || app.driver()).await;
    assert_eq!(results.len(), total);

    for result in &results {
        let known = KNOWN_DEFECTS.contains(&result.name.as_str());
        let want = if known {
            ScenarioVerdict::ExpectedFailure
        } else {
            ScenarioVerdict::Passed
        };
        assert_eq!(result.verdict, want, "{}: {:?}", result.name, result.error);
        assert!(result.teardown_errors.is_empty(), "{}: {:?}", result.name, result.teardown_errors);
    }

    let summary = Summary::of(&results);
    assert!(summary.is_green());
    assert_eq!(summary.expected_failures, KNOWN_DEFECTS.len());
    assert_no_leftovers(&app).await;
}

#[tokio::test]
async fn catalog_against_strict_module_flags_fixed_defects() {
    let app = app(SimQuirks::strict());
    let results = run_suite(catalog(&tests_dir().join("data")), config(), || app.driver()).await;

    let unexpected: Vec<_> = results
        .iter()
        .filter(|r| r.verdict == ScenarioVerdict::UnexpectedPass)
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(unexpected, KNOWN_DEFECTS.to_vec());
    assert!(results
        .iter()
        .filter(|r| !KNOWN_DEFECTS.contains(&r.name.as_str()))
        .all(|r| r.verdict == ScenarioVerdict::Passed));
    assert_eq!(Summary::of(&results).exit_code(), 1);
}

#[tokio::test]
async fn padded_names_are_stored_trimmed() {
    let app = app(SimQuirks::observed());
    let customers =
        TestCaseSet::<CustomerData>::load(tests_dir().join("data").join("customers_data.json"))
            .unwrap();
    let scenario = customer_scenario(customers.get("CUST_TC09").unwrap(), config().max_name_len);

    let result = run_one(&app, &scenario).await;
    assert_eq!(result.verdict, ScenarioVerdict::Passed, "{:?}", result.error);
    let check = result.steps.last().unwrap();
    assert_eq!(check.action, "check stored customer name");
    assert_eq!(check.observed, format!("'Trim Co {}'", result.suffix));
    assert_no_leftovers(&app).await;
}

#[tokio::test]
async fn slow_confirmations_fail_the_suite_without_leftovers() {
    let config = RunnerConfig {
        step_timeout: Duration::from_millis(100),
        ..config()
    };
    let app = SimulatedTimeModule::new(SimQuirks::strict(), &config.supervisor)
        .with_latency(Duration::from_millis(250));
    let scenario = Scenario::new("slow fixture")
        .with_fixture(EntitySpec::customer("Slow Co"))
        .step(Step::new(
            Actor::Supervisor,
            Action::CreateEntity {
                entity: EntitySpec::customer("Never Reached"),
            },
        ));

    let results = run_suite(vec![scenario], config, || app.driver()).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].verdict, ScenarioVerdict::Failed);
    assert!(results[0].error.as_deref().unwrap_or_default().contains("timed out after"));
    assert!(results[0].teardown_errors.is_empty());
    assert_eq!(Summary::of(&results).exit_code(), 1);
    assert_no_leftovers(&app).await;
}

#[tokio::test]
async fn rejection_round_trip_ends_approved() {
    let app = app(SimQuirks::strict());
    let timesheets =
        TestCaseSet::<TimesheetData>::load(tests_dir().join("data").join("timesheet_data.json"))
            .unwrap();
    let scenario = timesheet_scenario(timesheets.get("TIMESHEETS_02").unwrap());

    let result = run_one(&app, &scenario).await;
    assert_eq!(result.verdict, ScenarioVerdict::Passed, "{:?}", result.error);
    let path: Vec<_> = result.transitions.iter().map(|t| t.to).collect();
    assert_eq!(
        path,
        vec![
            TimesheetStatus::NotSubmitted,
            TimesheetStatus::Submitted,
            TimesheetStatus::Rejected,
            TimesheetStatus::NotSubmitted,
            TimesheetStatus::Submitted,
            TimesheetStatus::Approved,
        ]
    );
}

#[test]
fn factories_sharing_a_suffix_are_flagged() {
    let registry = SuffixRegistry::new();
    let mut first = FixtureFactory::with_suffix(registry.clone(), 4242);
    let mut second = FixtureFactory::with_suffix(registry.clone(), 4242);
    assert!(!first.collision_risk());
    assert!(second.collision_risk());

    // Same template, same suffix: the names collide across the two scenarios.
    let a = first.create(&EntitySpec::customer("ACME"), Actor::Supervisor);
    let b = second.create(&EntitySpec::customer("ACME"), Actor::Supervisor);
    assert_eq!(a.spec.name, b.spec.name);

    let third = FixtureFactory::new(registry.clone());
    assert_ne!(third.suffix(), 4242);
}

#[test]
fn malformed_scenario_files_fail_to_load() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("orphan.yaml");
    std::fs::write(
        &path,
        "name: orphan\nsteps:\n  - actor: employee\n    action: {type: submit_timesheet}\n",
    )
    .unwrap();
    tokio_test::assert_err!(Scenario::load(&path));
    tokio_test::assert_ok!(Scenario::load(tests_dir().join("scenarios").join("approval_flow.yaml")));
}

#[test]
fn scenarios_run_on_a_blocking_caller() {
    let app = app(SimQuirks::strict());
    let scenario = Scenario::new("single customer").step(Step::new(
        Actor::Supervisor,
        Action::CreateEntity {
            entity: EntitySpec::customer("Blocking Co"),
        },
    ));
    let result = tokio_test::block_on(run_one(&app, &scenario));
    assert_eq!(result.verdict, ScenarioVerdict::Passed, "{:?}", result.error);
    assert!(tokio_test::block_on(app.entity_names(EntityKind::Customer)).is_empty());
}
