//! Test-case documents and their typed per-domain schemas.
//!
//! Documents map case IDs to `{test_data, expected_result | expected_error}`:
//!
//! ```json
//! {"test_cases": {"CUST_TC05": {
//!     "description": "Add customer with duplicate name",
//!     "test_data": {"customer_name": "ABC Corp"},
//!     "expected_error": "Already exists"}}}
//! ```
//!
//! Cases are checked when the document is loaded; a case missing a required
//! field fails the load with [`Error::MalformedFixture`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::outcome::Outcome;
use crate::workflow::{Day, TimesheetRow, TimesheetStatus};

/// Schema of one domain's `test_data`.
pub trait CaseData: DeserializeOwned {
    /// Cross-field checks serde cannot express.
    fn check(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// A loaded, immutable test case.
#[derive(Debug, Clone)]
pub struct TestCase<T> {
    pub id: String,
    pub description: String,
    pub data: T,
    pub expected: Outcome,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    test_cases: BTreeMap<String, RawCase>,
}

#[derive(Debug, Deserialize)]
struct RawCase {
    #[serde(default)]
    description: String,
    #[serde(default)]
    test_data: Option<serde_json::Value>,
    #[serde(default)]
    expected_result: Option<String>,
    #[serde(default)]
    expected_error: Option<String>,
}

/// All cases of one document, keyed by ID.
#[derive(Debug, Clone)]
pub struct TestCaseSet<T> {
    cases: BTreeMap<String, TestCase<T>>,
}

impl<T: CaseData> TestCaseSet<T> {
    /// Loads a document from a JSON or YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");

        let raw: RawDocument = if is_json {
            serde_json::from_str(&content).map_err(|e| Error::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| Error::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };
        Self::from_raw(raw)
    }

    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawDocument = serde_json::from_str(json).map_err(|e| Error::Parse {
            path: "<inline>".into(),
            reason: e.to_string(),
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDocument) -> Result<Self> {
        let mut cases = BTreeMap::new();
        for (id, case) in raw.test_cases {
            let value = case
                .test_data
                .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
            let data: T = serde_json::from_value(value).map_err(|e| Error::MalformedFixture {
                case: id.clone(),
                reason: e.to_string(),
            })?;
            data.check().map_err(|reason| Error::MalformedFixture {
                case: id.clone(),
                reason,
            })?;

            let expected = Outcome::from_expectation(
                case.expected_result.as_deref(),
                case.expected_error.as_deref(),
            );
            cases.insert(
                id.clone(),
                TestCase {
                    id,
                    description: case.description,
                    data,
                    expected,
                },
            );
        }
        Ok(Self { cases })
    }

    /// Looks up a case by ID.
    pub fn get(&self, id: &str) -> Result<&TestCase<T>> {
        self.cases.get(id).ok_or_else(|| Error::MalformedFixture {
            case: id.to_string(),
            reason: "no such test case".to_string(),
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.cases.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// `test_data` of customer cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerData {
    pub customer_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CaseData for CustomerData {}

/// `test_data` of project and activity cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectData {
    pub project_name: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub admins: Vec<String>,
    /// Activity a project-activity case adds.
    #[serde(default)]
    pub activity_name: Option<String>,
    /// Several activities added one after another.
    #[serde(default)]
    pub activity_names: Vec<String>,
    /// Activities the project is created with.
    #[serde(default)]
    pub activities: Vec<String>,
}

impl ProjectData {
    /// Activities the case adds, in order.
    pub fn added_activities(&self) -> Vec<String> {
        match &self.activity_name {
            Some(name) => vec![name.clone()],
            None => self.activity_names.clone(),
        }
    }
}

impl CaseData for ProjectData {
    fn check(&self) -> std::result::Result<(), String> {
        if self.activity_name.is_some() && !self.activity_names.is_empty() {
            return Err("give either activity_name or activity_names, not both".to_string());
        }
        Ok(())
    }
}

/// `test_data` of timesheet cases.
///
/// A case gives either `rows`, or a single `project`/`activity` with
/// `hours` (and optionally `initial_hours`/`corrected_hours` for
/// rejection flows).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimesheetData {
    #[serde(default)]
    pub rows: Vec<TimesheetRow>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub hours: BTreeMap<Day, String>,
    #[serde(default)]
    pub initial_hours: BTreeMap<Day, String>,
    #[serde(default)]
    pub corrected_hours: BTreeMap<Day, String>,
    #[serde(default)]
    pub expected_status_after_submit: Option<TimesheetStatus>,
    #[serde(default)]
    pub expected_status_after_approve: Option<TimesheetStatus>,
    #[serde(default)]
    pub expected_status_after_reject: Option<TimesheetStatus>,
    #[serde(default)]
    pub expected_status_after_resubmit: Option<TimesheetStatus>,
    #[serde(default)]
    pub expected_total_hours: Option<String>,
}

impl TimesheetData {
    fn single_row(&self, hours: &BTreeMap<Day, String>) -> Vec<TimesheetRow> {
        match (&self.project, &self.activity) {
            (Some(project), Some(activity)) => vec![TimesheetRow {
                project: project.clone(),
                activity: activity.clone(),
                hours: hours.clone(),
            }],
            _ => Vec::new(),
        }
    }

    /// Rows to enter first.
    pub fn rows(&self) -> Vec<TimesheetRow> {
        if !self.rows.is_empty() {
            return self.rows.clone();
        }
        if self.hours.is_empty() && !self.initial_hours.is_empty() {
            return self.single_row(&self.initial_hours);
        }
        self.single_row(&self.hours)
    }

    /// Rows entered after a rejection, if the case has a correction.
    pub fn corrected_rows(&self) -> Option<Vec<TimesheetRow>> {
        if self.corrected_hours.is_empty() {
            return None;
        }
        Some(self.single_row(&self.corrected_hours))
    }
}

impl CaseData for TimesheetData {
    fn check(&self) -> std::result::Result<(), String> {
        if self.project.is_some() != self.activity.is_some() {
            return Err("project and activity must be given together".to_string());
        }
        if !self.rows.is_empty() && self.project.is_some() {
            return Err("give either rows or project/activity, not both".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_cases_parse_with_expectations() {
        let json = r#"{"test_cases": {
            "CUST_TC01": {"description": "valid", "test_data": {"customer_name": "ACME", "description": "d"}, "expected_result": "Successfully Saved"},
            "CUST_TC05": {"test_data": {"customer_name": "ABC Corp"}, "expected_error": "Already exists"}
        }}"#;
        let set = TestCaseSet::<CustomerData>::from_json_str(json).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("CUST_TC01").unwrap().expected, Outcome::Success);
        assert_eq!(set.get("CUST_TC05").unwrap().expected, Outcome::DuplicateError);
        assert_eq!(set.get("CUST_TC05").unwrap().data.customer_name, "ABC Corp");
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let json = r#"{"test_cases": {"PRJ_TC01": {"test_data": {"customer_name": "ACME"}}}}"#;
        let err = TestCaseSet::<ProjectData>::from_json_str(json).unwrap_err();
        match err {
            Error::MalformedFixture { case, reason } => {
                assert_eq!(case, "PRJ_TC01");
                assert!(reason.contains("project_name"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn unknown_case_id_is_reported() {
        let set = TestCaseSet::<CustomerData>::from_json_str(r#"{"test_cases": {}}"#).unwrap();
        assert!(set.is_empty());
        assert!(matches!(set.get("NOPE"), Err(Error::MalformedFixture { .. })));
    }

    #[test]
    fn timesheet_single_row_form() {
        let json = r#"{"test_cases": {"TIMESHEETS_01": {"test_data": {
            "project": "ACME Web", "activity": "Development",
            "hours": {"Mon": "4", "Tue": "4"},
            "expected_status_after_submit": "Submitted",
            "expected_status_after_approve": "Approved"
        }}}}"#;
        let set = TestCaseSet::<TimesheetData>::from_json_str(json).unwrap();
        let data = &set.get("TIMESHEETS_01").unwrap().data;
        let rows = data.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hours.get(&Day::Tue).map(String::as_str), Some("4"));
        assert_eq!(
            data.expected_status_after_approve,
            Some(TimesheetStatus::Approved)
        );
        assert!(data.corrected_rows().is_none());
    }

    #[test]
    fn timesheet_with_project_but_no_activity_is_malformed() {
        let json = r#"{"test_cases": {"T": {"test_data": {"project": "ACME Web"}}}}"#;
        assert!(matches!(
            TestCaseSet::<TimesheetData>::from_json_str(json),
            Err(Error::MalformedFixture { .. })
        ));
    }

    #[test]
    fn case_without_test_data_uses_defaults() {
        let json = r#"{"test_cases": {"TIMESHEETS_03": {"expected_result": "Submission blocked"}}}"#;
        let set = TestCaseSet::<TimesheetData>::from_json_str(json).unwrap();
        let case = set.get("TIMESHEETS_03").unwrap();
        assert!(case.data.rows().is_empty());
        assert_eq!(case.expected, Outcome::Unknown);
    }

    #[test]
    fn loads_yaml_document_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("projects.yaml");
        std::fs::write(
            &path,
            "test_cases:\n  PROJ_TC15:\n    test_data:\n      project_name: ACME Web\n      activity_names: [Design, Development]\n",
        )
        .unwrap();

        let set = TestCaseSet::<ProjectData>::load(&path).unwrap();
        let data = &set.get("PROJ_TC15").unwrap().data;
        assert_eq!(data.added_activities(), vec!["Design", "Development"]);
        assert_eq!(set.get("PROJ_TC15").unwrap().expected, Outcome::Unknown);
    }

    #[test]
    fn single_and_multiple_activities_are_exclusive() {
        let json = r#"{"test_cases": {"P": {"test_data": {
            "project_name": "ACME Web", "activity_name": "Design", "activity_names": ["Testing"]
        }}}}"#;
        assert!(matches!(
            TestCaseSet::<ProjectData>::from_json_str(json),
            Err(Error::MalformedFixture { .. })
        ));
    }
}
