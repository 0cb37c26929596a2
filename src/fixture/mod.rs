//! Test data: entity templates, the fixture factory and test-case documents.

pub mod entity;
pub mod factory;
pub mod testcase;

pub use entity::{
    check_constraints, normalize_name, EmployeeIdentity, EntityKind, EntityModel, EntitySpec,
};
pub use factory::{uniqueify, EntityHandle, FixtureFactory, SuffixRegistry};
pub use testcase::{CaseData, CustomerData, ProjectData, TestCase, TestCaseSet, TimesheetData};
