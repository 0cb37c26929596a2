//! Scenarios built from test-case documents.
//!
//! Each domain's cases map onto the same scenario shape: fixtures first,
//! then the action under test with the case's expectation. Duplicate cases
//! get a fixture with the trimmed name so the second create is the check.
//! Creates expected to succeed are followed by reading the stored name back.

use crate::fixture::factory::DEFAULT_EMPLOYEE_PASSWORD;
use crate::fixture::{CustomerData, EntityKind, EntitySpec, ProjectData, TestCase, TimesheetData};
use crate::messages;
use crate::outcome::Outcome;
use crate::workflow::{Actor, TimesheetRow, TimesheetStatus};

use super::scenario::{Action, Scenario, Step};

/// Cases documenting defects of the live module.
pub const KNOWN_DEFECTS: &[&str] = &["CUST_TC11", "PROJ_TC17", "TIMESHEETS_03", "TIMESHEETS_06"];

/// First name of the employee fixture in timesheet scenarios.
pub const EMPLOYEE_FIRST_NAME: &str = "employee";

/// Customer owning the projects timesheet rows are booked on.
pub const TIMESHEET_CUSTOMER: &str = "Timesheet Customer";

/// Room left for the uniqueifier when a name is suffixed.
const SUFFIX_ROOM: usize = 5;

fn base_scenario<T>(case: &TestCase<T>) -> Scenario {
    let mut scenario = Scenario::new(&case.id).with_description(&case.description);
    if KNOWN_DEFECTS.contains(&case.id.as_str()) {
        scenario = scenario.expected_to_fail();
    }
    scenario
}

/// Keeps names exact where the length itself is under test.
fn sized(spec: EntitySpec, expected: &Outcome, max_name_len: usize) -> EntitySpec {
    let near_limit = spec.name.chars().count() + SUFFIX_ROOM > max_name_len;
    if near_limit || matches!(expected, Outcome::ValidationError(_)) {
        spec.exact()
    } else {
        spec
    }
}

fn create_step(entity: EntitySpec, expected: &Outcome) -> Step {
    let step = Step::new(Actor::Supervisor, Action::CreateEntity { entity });
    step.expect(expected.clone())
}

/// The create step, plus a stored-name check when the create should succeed.
fn create_and_check(scenario: Scenario, entity: EntitySpec, expected: &Outcome) -> Scenario {
    let check = Action::ExpectStoredName {
        kind: entity.kind,
        name: entity.name.clone(),
    };
    let scenario = scenario.step(create_step(entity, expected));
    if expected.is_success() {
        scenario.step(Step::new(Actor::Supervisor, check))
    } else {
        scenario
    }
}

/// One customer create, preceded by the original for duplicate cases.
pub fn customer_scenario(case: &TestCase<CustomerData>, max_name_len: usize) -> Scenario {
    let data = &case.data;
    let mut entity = EntitySpec::customer(&data.customer_name);
    if let Some(description) = &data.description {
        entity = entity.with_description(description);
    }
    let entity = sized(entity, &case.expected, max_name_len);

    let mut scenario = base_scenario(case);
    if case.expected == Outcome::DuplicateError {
        let mut original = entity.clone();
        original.name = data.customer_name.trim().to_string();
        scenario = scenario.with_fixture(original);
    }
    create_and_check(scenario, entity, &case.expected)
}

/// A project create, or activity creates when the case names some.
pub fn project_scenario(case: &TestCase<ProjectData>, max_name_len: usize) -> Scenario {
    let data = &case.data;
    let mut scenario = base_scenario(case);

    let customer = data
        .customer_name
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    if let Some(customer) = customer {
        scenario = scenario.with_fixture(EntitySpec::customer(customer));
    }

    let mut project = EntitySpec::new(EntityKind::Project, &data.project_name)
        .with_admins(data.admins.clone())
        .with_activities(data.activities.clone());
    if let Some(customer) = customer {
        project = project.with_customer(customer);
    }
    if let Some(description) = &data.description {
        project = project.with_description(description);
    }

    let activities = data.added_activities();
    if activities.is_empty() {
        let entity = sized(project, &case.expected, max_name_len);
        if case.expected == Outcome::DuplicateError {
            let mut original = entity.clone();
            original.name = data.project_name.trim().to_string();
            scenario = scenario.with_fixture(original);
        }
        return create_and_check(scenario, entity, &case.expected);
    }

    scenario = scenario.with_fixture(project.with_activities(Vec::new()));
    for activity in &activities {
        let entity = sized(
            EntitySpec::activity(activity, &data.project_name),
            &case.expected,
            max_name_len,
        );
        if case.expected == Outcome::DuplicateError {
            let mut original = entity.clone();
            original.name = activity.trim().to_string();
            scenario = scenario.with_fixture(original);
        }
        scenario = create_and_check(scenario, entity, &case.expected);
    }
    scenario
}

/// Adds the customer, projects and activities the rows are booked on.
fn with_row_fixtures<'a>(
    mut scenario: Scenario,
    rows: impl Iterator<Item = &'a TimesheetRow>,
) -> Scenario {
    let mut projects: Vec<(String, Vec<String>)> = Vec::new();
    for row in rows {
        let project = row.project.trim();
        let activity = row.activity.trim();
        if project.is_empty() {
            continue;
        }
        let index = match projects.iter().position(|(name, _)| name == project) {
            Some(index) => index,
            None => {
                projects.push((project.to_string(), Vec::new()));
                projects.len() - 1
            }
        };
        let activities = &mut projects[index].1;
        if !activity.is_empty() && !activities.iter().any(|a| a == activity) {
            activities.push(activity.to_string());
        }
    }
    if projects.is_empty() {
        return scenario;
    }

    scenario = scenario.with_fixture(EntitySpec::customer(TIMESHEET_CUSTOMER));
    for (project, activities) in projects {
        scenario = scenario.with_fixture(
            EntitySpec::project(project, TIMESHEET_CUSTOMER).with_activities(activities),
        );
    }
    scenario
}

fn status_check(actor: Actor, status: TimesheetStatus) -> Step {
    Step::new(actor, Action::ExpectStatus { status })
}

/// The employee's timesheet walked through the statuses the case names.
///
/// Save, then submit, then reject and resubmit the corrected rows, then
/// approve; each stage only when the case gives its expected status.
pub fn timesheet_scenario(case: &TestCase<TimesheetData>) -> Scenario {
    let data = &case.data;
    let mut scenario = base_scenario(case).with_employee(EntitySpec::employee(EMPLOYEE_FIRST_NAME, DEFAULT_EMPLOYEE_PASSWORD));

    let rows: Vec<TimesheetRow> = data.rows();
    scenario = with_row_fixtures(scenario, rows.iter().chain(data.corrected_rows().iter().flatten()));
    if rows.is_empty() {
        let expect = match &case.expected {
            Outcome::Unknown | Outcome::Success => {
                Outcome::ValidationError(messages::EMPTY_TIMESHEET.to_string())
            }
            other => other.clone(),
        };
        return scenario
            .step(Step::new(Actor::Employee, Action::SubmitTimesheet).expect(expect))
            .step(status_check(Actor::Employee, TimesheetStatus::NotSubmitted));
    }

    let save = Step::new(Actor::Employee, Action::SaveTimesheet { rows });
    if let Outcome::ValidationError(_) = &case.expected {
        return scenario
            .step(save.expect(case.expected.clone()))
            .step(status_check(Actor::Employee, TimesheetStatus::NotSubmitted));
    }
    scenario = scenario.step(save);

    if let Some(status) = data.expected_status_after_submit {
        scenario = scenario
            .step(Step::new(Actor::Employee, Action::SubmitTimesheet))
            .step(status_check(Actor::Employee, status));
    }

    if let Some(status) = data.expected_status_after_reject {
        scenario = scenario
            .step(Step::new(
                Actor::Supervisor,
                Action::RejectTimesheet {
                    comment: Some(format!("{}: please correct the hours", case.id)),
                },
            ))
            .step(status_check(Actor::Supervisor, status))
            .step(status_check(Actor::Employee, status));

        if let Some(corrected) = data.corrected_rows() {
            scenario = scenario.step(Step::new(
                Actor::Employee,
                Action::SaveTimesheet { rows: corrected },
            ));
        }
        if let Some(status) = data.expected_status_after_resubmit {
            scenario = scenario
                .step(Step::new(Actor::Employee, Action::SubmitTimesheet))
                .step(status_check(Actor::Employee, status));
        }
    }

    if let Some(status) = data.expected_status_after_approve {
        scenario = scenario
            .step(Step::new(Actor::Supervisor, Action::ApproveTimesheet))
            .step(status_check(Actor::Employee, status))
            .step(Step::new(Actor::Employee, Action::ExpectEditUnavailable));
    }

    if let Some(total) = &data.expected_total_hours {
        scenario = scenario.step(Step::new(
            Actor::Employee,
            Action::ExpectTotalHours {
                total: total.clone(),
            },
        ));
    }
    scenario
}
