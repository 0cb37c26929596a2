//! Entities of the Time module and their name constraints.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::messages;
use crate::outcome::Outcome;

/// Kind of entity a fixture can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Customer,
    Project,
    Activity,
    Employee,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Customer => write!(f, "customer"),
            EntityKind::Project => write!(f, "project"),
            EntityKind::Activity => write!(f, "activity"),
            EntityKind::Employee => write!(f, "employee"),
        }
    }
}

fn default_unique() -> bool {
    true
}

/// Template for an entity to create.
///
/// For employees `name` is the first name; the uniqueifier becomes the last
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub kind: EntityKind,
    pub name: String,
    /// Append the scenario uniqueifier to `name`.
    #[serde(default = "default_unique")]
    pub unique: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Owning customer of a project.
    #[serde(default)]
    pub customer: Option<String>,
    /// Owning project of an activity.
    #[serde(default)]
    pub project: Option<String>,
    /// Project admins, by employee name.
    #[serde(default)]
    pub admins: Vec<String>,
    /// Activities created together with a project.
    #[serde(default)]
    pub activities: Vec<String>,
    /// Login password of an employee.
    #[serde(default)]
    pub password: Option<String>,
}

impl EntitySpec {
    /// A template with no associations.
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            unique: true,
            description: None,
            customer: None,
            project: None,
            admins: Vec::new(),
            activities: Vec::new(),
            password: None,
        }
    }

    pub fn customer(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Customer, name)
    }

    pub fn project(name: impl Into<String>, customer: impl Into<String>) -> Self {
        Self::new(EntityKind::Project, name).with_customer(customer)
    }

    pub fn activity(name: impl Into<String>, project: impl Into<String>) -> Self {
        Self::new(EntityKind::Activity, name).with_project(project)
    }

    pub fn employee(first_name: impl Into<String>, password: impl Into<String>) -> Self {
        let mut spec = Self::new(EntityKind::Employee, first_name);
        spec.password = Some(password.into());
        spec
    }

    /// Uses `name` verbatim.
    pub fn exact(mut self) -> Self {
        self.unique = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_admins(mut self, admins: Vec<String>) -> Self {
        self.admins = admins;
        self
    }

    pub fn with_activities(mut self, activities: Vec<String>) -> Self {
        self.activities = activities;
        self
    }

    /// Scope in which the name must be unique.
    fn scope(&self) -> String {
        match self.kind {
            EntityKind::Activity => normalize_name(self.project.as_deref().unwrap_or_default()),
            _ => String::new(),
        }
    }
}

/// Login identity of an employee fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeIdentity {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub password: String,
}

impl EmployeeIdentity {
    /// Name under which supervisors search for the employee.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Name normalization the module is expected to apply before
/// checking for duplicates.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_string()
}

/// Checks the name and association constraints of a (resolved) spec.
///
/// Returns the validation message the module should show.
pub fn check_constraints(spec: &EntitySpec, max_name_len: usize) -> Result<(), String> {
    if spec.name.trim().is_empty() {
        return Err(messages::REQUIRED.to_string());
    }
    if spec.kind != EntityKind::Employee && spec.name.chars().count() > max_name_len {
        return Err(messages::too_long(max_name_len));
    }
    let missing = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or_default().is_empty();
    match spec.kind {
        EntityKind::Project if missing(&spec.customer) => Err(messages::REQUIRED.to_string()),
        EntityKind::Activity if missing(&spec.project) => Err(messages::REQUIRED.to_string()),
        _ => Ok(()),
    }
}

/// Entities the harness believes exist, for predicting create outcomes.
#[derive(Debug, Clone)]
pub struct EntityModel {
    max_name_len: usize,
    live: HashSet<(EntityKind, String, String)>,
}

impl EntityModel {
    pub fn new(max_name_len: usize) -> Self {
        Self {
            max_name_len,
            live: HashSet::new(),
        }
    }

    fn key(spec: &EntitySpec) -> (EntityKind, String, String) {
        (spec.kind, spec.scope(), normalize_name(&spec.name))
    }

    /// Predicts what creating `spec` shows.
    pub fn predict_create(&self, spec: &EntitySpec) -> Outcome {
        if let Err(message) = check_constraints(spec, self.max_name_len) {
            return Outcome::ValidationError(message);
        }
        if self.live.contains(&Self::key(spec)) {
            return Outcome::DuplicateError;
        }
        Outcome::Success
    }

    /// Records an entity as existing.
    pub fn created(&mut self, spec: &EntitySpec) {
        self.live.insert(Self::key(spec));
        if spec.kind == EntityKind::Project {
            for activity in &spec.activities {
                self.live.insert((
                    EntityKind::Activity,
                    normalize_name(&spec.name),
                    normalize_name(activity),
                ));
            }
        }
    }

    /// Records an entity as removed.
    pub fn deleted(&mut self, spec: &EntitySpec) {
        self.live.remove(&Self::key(spec));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_is_required() {
        let spec = EntitySpec::customer("   ");
        assert_eq!(check_constraints(&spec, 50), Err("Required".to_string()));
    }

    #[test]
    fn boundary_length_is_allowed() {
        let name = "A".repeat(50);
        assert_eq!(check_constraints(&EntitySpec::customer(&name), 50), Ok(()));
        let name = "A".repeat(51);
        assert_eq!(
            check_constraints(&EntitySpec::customer(&name), 50),
            Err("Should not exceed 50 characters".to_string())
        );
    }

    #[test]
    fn project_needs_customer() {
        let spec = EntitySpec::new(EntityKind::Project, "Website");
        assert_eq!(check_constraints(&spec, 50), Err("Required".to_string()));
    }

    #[test]
    fn duplicate_prediction_trims_whitespace() {
        let mut model = EntityModel::new(50);
        let first = EntitySpec::customer("ABC Corp");
        assert_eq!(model.predict_create(&first), Outcome::Success);
        model.created(&first);

        let padded = EntitySpec::customer("  ABC Corp  ");
        assert_eq!(model.predict_create(&padded), Outcome::DuplicateError);

        model.deleted(&first);
        assert_eq!(model.predict_create(&padded), Outcome::Success);
    }

    #[test]
    fn activity_names_are_scoped_by_project() {
        let mut model = EntityModel::new(50);
        let project = EntitySpec::project("Website", "ACME")
            .with_activities(vec!["Development".to_string()]);
        model.created(&project);

        assert_eq!(
            model.predict_create(&EntitySpec::activity(" Development ", "Website")),
            Outcome::DuplicateError
        );
        assert_eq!(
            model.predict_create(&EntitySpec::activity("Development", "Mobile")),
            Outcome::Success
        );
    }

    #[test]
    fn spec_deserializes_with_defaults() {
        let yaml = "kind: project\nname: Website\ncustomer: ACME\n";
        let spec: EntitySpec = serde_yaml::from_str(yaml).unwrap();
        assert!(spec.unique);
        assert_eq!(spec.customer.as_deref(), Some("ACME"));
        assert!(spec.admins.is_empty());
    }
}
