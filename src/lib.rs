//! Workflow Harness - actor-driven verification of the Time module
//!
//! This library drives the customers, projects, activities and timesheets
//! workflow as a Supervisor and an Employee, predicts every step with a pure
//! timesheet state machine, and reports where the module diverges from its
//! documented behavior.

pub mod backoff;
pub mod config;
pub mod debug;
pub mod driver;
pub mod error;
pub mod fixture;
pub mod harness;
pub mod messages;
pub mod outcome;
pub mod workflow;

pub use error::{Error, Result};
pub use outcome::{Candidate, Outcome};

pub use config::{HarnessConfig, Validate, ValidationResult};
pub use driver::{
    Credentials, NavTarget, PageDriver, SimDriver, SimQuirks, SimulatedTimeModule,
    TimeModuleDriver,
};
pub use fixture::{
    EmployeeIdentity, EntityHandle, EntityKind, EntityModel, EntitySpec, FixtureFactory,
    SuffixRegistry, TestCase, TestCaseSet,
};
pub use harness::{
    run_suite, Action, AssertionMode, DefectReport, RunReport, RunnerConfig, Scenario,
    ScenarioResult, ScenarioRunner, ScenarioVerdict, Step, Summary,
};
pub use workflow::{
    Actor, Day, GuardFailure, Timesheet, TimesheetAction, TimesheetRow, TimesheetStatus,
    TransitionError,
};
