//! Scenario execution: sessions, observation, recording, running and reporting.

pub mod catalog;
pub mod observe;
pub mod recorder;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod session;

pub use catalog::{customer_scenario, project_scenario, timesheet_scenario, KNOWN_DEFECTS};
pub use observe::{observe_outcome, wait_for_text, Observation};
pub use recorder::{AssertionMode, DefectReport, Recorder, StepContext, Verdict};
pub use report::{render_result, render_text, RunReport, Summary};
pub use runner::{
    run_suite, RunnerConfig, ScenarioResult, ScenarioRunner, ScenarioVerdict, StepRecord,
};
pub use scenario::{Action, Scenario, Step};
pub use session::{ActorSession, Sessions};
