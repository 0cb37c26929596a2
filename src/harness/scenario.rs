//! Scenario definitions and scenario files.
//!
//! ```yaml
//! name: approval flow
//! employee: {kind: employee, name: employee}
//! fixtures:
//!   - {kind: customer, name: ACME}
//!   - {kind: project, name: ACME Web, customer: ACME, activities: [Development]}
//! steps:
//!   - actor: employee
//!     action:
//!       type: save_timesheet
//!       rows: [{project: ACME Web, activity: Development, hours: {Mon: "4"}}]
//!   - actor: employee
//!     action: {type: submit_timesheet}
//! ```
//!
//! Unit expectations are plain strings (`expect: duplicate_error`). A
//! validation message uses a YAML tag, `expect: !validation_error Required`;
//! JSON scenario files write it as `{"validation_error": "Required"}`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fixture::{EntityKind, EntitySpec};
use crate::outcome::Outcome;
use crate::workflow::{Actor, TimesheetRow, TimesheetStatus};

use super::recorder::AssertionMode;

/// An ordered sequence of actor actions with expected outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Employee fixture whose identity the Employee actor logs in with.
    #[serde(default)]
    pub employee: Option<EntitySpec>,
    /// Entities created by the Supervisor before the first step.
    #[serde(default)]
    pub fixtures: Vec<EntitySpec>,
    pub steps: Vec<Step>,
    /// The scenario documents a known defect of the module.
    #[serde(default)]
    pub expected_to_fail: bool,
}

/// One action and its expectation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub actor: Actor,
    pub action: Action,
    #[serde(default)]
    pub expect: Outcome,
    #[serde(default)]
    pub mode: AssertionMode,
    /// Keep going after the module disagrees with the workflow model.
    #[serde(default)]
    pub continue_on_divergence: bool,
}

impl Step {
    pub fn new(actor: Actor, action: Action) -> Self {
        Self {
            actor,
            action,
            expect: Outcome::Success,
            mode: AssertionMode::Required,
            continue_on_divergence: false,
        }
    }

    pub fn expect(mut self, outcome: Outcome) -> Self {
        self.expect = outcome;
        self
    }

    pub fn discovery(mut self) -> Self {
        self.mode = AssertionMode::Discovery;
        self
    }

    pub fn continue_on_divergence(mut self) -> Self {
        self.continue_on_divergence = true;
        self
    }
}

/// What a step does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    CreateEntity {
        entity: EntitySpec,
    },
    SaveTimesheet {
        #[serde(default)]
        rows: Vec<TimesheetRow>,
    },
    SubmitTimesheet,
    ApproveTimesheet,
    RejectTimesheet {
        #[serde(default)]
        comment: Option<String>,
    },
    /// The Edit control must not be offered.
    ExpectEditUnavailable,
    /// The status banner must read `status`.
    ExpectStatus {
        status: TimesheetStatus,
    },
    /// The grand-total cell must read `total`.
    ExpectTotalHours {
        total: String,
    },
    /// Reopening the entity created from `name` must show it trimmed.
    ExpectStoredName {
        kind: EntityKind,
        name: String,
    },
}

impl Action {
    /// Short label for logs and reports.
    pub fn label(&self) -> String {
        match self {
            Action::CreateEntity { entity } => format!("create {}", entity.kind),
            Action::SaveTimesheet { .. } => "save timesheet".to_string(),
            Action::SubmitTimesheet => "submit timesheet".to_string(),
            Action::ApproveTimesheet => "approve timesheet".to_string(),
            Action::RejectTimesheet { .. } => "reject timesheet".to_string(),
            Action::ExpectEditUnavailable => "check edit unavailable".to_string(),
            Action::ExpectStatus { .. } => "check status".to_string(),
            Action::ExpectTotalHours { .. } => "check total hours".to_string(),
            Action::ExpectStoredName { kind, .. } => format!("check stored {} name", kind),
        }
    }
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            employee: None,
            fixtures: Vec::new(),
            steps: Vec::new(),
            expected_to_fail: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_employee(mut self, employee: EntitySpec) -> Self {
        self.employee = Some(employee);
        self
    }

    pub fn with_fixture(mut self, fixture: EntitySpec) -> Self {
        self.fixtures.push(fixture);
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn expected_to_fail(mut self) -> Self {
        self.expected_to_fail = true;
        self
    }

    /// Rejects scenarios that cannot run.
    pub fn check(&self) -> Result<()> {
        let malformed = |reason: &str| Error::MalformedFixture {
            case: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.steps.is_empty() {
            return Err(malformed("scenario has no steps"));
        }
        if self.employee.is_none() && self.steps.iter().any(|s| s.actor == Actor::Employee) {
            return Err(malformed("employee steps need an employee fixture"));
        }
        if let Some(employee) = &self.employee {
            if employee.kind != EntityKind::Employee {
                return Err(malformed("employee fixture must be of kind employee"));
            }
        }
        Ok(())
    }

    /// Loads one scenario from a YAML or JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let parse_err = |reason: String| Error::Parse {
            path: path.to_path_buf(),
            reason,
        };
        let scenario: Scenario = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?
        } else {
            serde_yaml::from_str(&content).map_err(|e| parse_err(e.to_string()))?
        };
        scenario.check()?;
        Ok(scenario)
    }
}
