//! Page driver interface to the system under test.
//!
//! [`PageDriver`] holds the primitive page capabilities. [`TimeModuleDriver`]
//! adds the abstract actions the harness issues; how an implementation maps
//! them onto selectors is its own concern.

mod sim;

pub use sim::{SimDriver, SimQuirks, SimulatedTimeModule};

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fixture::{EmployeeIdentity, EntityKind, EntitySpec};
use crate::workflow::TimesheetRow;

/// A page of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavTarget {
    Login,
    Dashboard,
    Employees,
    Customers,
    Projects,
    Activities,
    MyTimesheets,
    EmployeeTimesheets,
}

impl NavTarget {
    /// Page on which entities of `kind` are managed.
    pub fn for_entity(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Customer => NavTarget::Customers,
            EntityKind::Project => NavTarget::Projects,
            EntityKind::Activity => NavTarget::Activities,
            EntityKind::Employee => NavTarget::Employees,
        }
    }
}

impl fmt::Display for NavTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NavTarget::Login => "Login",
            NavTarget::Dashboard => "Dashboard",
            NavTarget::Employees => "PIM > Employee List",
            NavTarget::Customers => "Time > Project Info > Customers",
            NavTarget::Projects => "Time > Project Info > Projects",
            NavTarget::Activities => "Time > Project Info > Activities",
            NavTarget::MyTimesheets => "Time > Timesheets > My Timesheets",
            NavTarget::EmployeeTimesheets => "Time > Timesheets > Employee Timesheets",
        };
        f.write_str(name)
    }
}

/// Login credentials of one identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl From<&EmployeeIdentity> for Credentials {
    fn from(identity: &EmployeeIdentity) -> Self {
        Credentials::new(&identity.username, &identity.password)
    }
}

/// Primitive page capabilities.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Opens a page.
    async fn navigate(&self, target: NavTarget) -> Result<()>;

    /// Types a value into a named field of the current form.
    async fn fill_field(&self, field: &str, value: &str) -> Result<()>;

    /// Activates a named control (button, link).
    async fn click_control(&self, control: &str) -> Result<()>;

    /// Whether `text` is currently visible on the page.
    async fn is_visible(&self, text: &str) -> Result<bool>;

    /// Current value of a named field.
    async fn get_value(&self, field: &str) -> Result<Option<String>>;

    /// Captures the page to `path`.
    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Waits until `text` is visible, failing with
    /// [`crate::Error::ObservationTimeout`] after `timeout`.
    async fn wait_for_text(&self, text: &str, timeout: Duration) -> Result<()> {
        crate::harness::observe::wait_for_text(self, text, timeout).await
    }

    /// Returns the name of this driver.
    fn name(&self) -> &str;
}

/// Abstract actions on the Time module.
#[async_trait]
pub trait TimeModuleDriver: PageDriver {
    async fn login(&self, credentials: &Credentials) -> Result<()>;

    async fn logout(&self) -> Result<()>;

    /// Fills and saves the create form for `spec` on the current page.
    async fn create_entity(&self, spec: &EntitySpec) -> Result<()>;

    /// Adds an employee with a login account.
    async fn create_employee(&self, identity: &EmployeeIdentity) -> Result<()>;

    /// Opens the edit form of the stored entity named `name` on the current
    /// page, so its fields can be read back. Fails with
    /// [`crate::Error::NotFound`] when there is none.
    async fn open_entity(&self, kind: EntityKind, name: &str) -> Result<()>;

    /// Deletes the entity named `name`.
    async fn delete_entity(&self, kind: EntityKind, name: &str) -> Result<()>;

    /// Enters `rows` into the current user's timesheet and saves.
    async fn save_timesheet(&self, rows: &[TimesheetRow]) -> Result<()>;

    async fn submit_timesheet(&self) -> Result<()>;

    /// Opens `employee`'s submitted timesheet and approves it.
    async fn approve_timesheet(&self, employee: &str) -> Result<()>;

    /// Opens `employee`'s submitted timesheet and rejects it.
    async fn reject_timesheet(&self, employee: &str, comment: Option<&str>) -> Result<()>;

    /// Whether the Edit control is offered on the current timesheet.
    async fn edit_available(&self) -> Result<bool>;

    /// Text of the timesheet's grand-total cell.
    async fn total_hours(&self) -> Result<Option<String>>;
}
