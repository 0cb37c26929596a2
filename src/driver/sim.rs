//! In-memory Time module.
//!
//! Shows the same texts as the real module and keeps shared state across
//! drivers, so scenarios running in parallel contend for one name space.
//! [`SimQuirks`] switches on the defects the browser suite observed, which
//! lets discovery scenarios run without a browser.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{Credentials, NavTarget, PageDriver, TimeModuleDriver};
use crate::error::{Error, Result};
use crate::fixture::{EmployeeIdentity, EntityKind, EntitySpec};
use crate::messages;
use crate::workflow::{
    check_rows, check_submittable, format_hours, GuardFailure, TimesheetRow, TimesheetStatus,
};

/// Behavioral switches of the simulated module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimQuirks {
    /// Trim input before looking for an existing name.
    pub trim_before_duplicate_check: bool,
    /// Accept Submit on a timesheet with no rows.
    pub accept_empty_submission: bool,
    /// Accept rows whose hours add up to zero.
    pub accept_rows_without_hours: bool,
    /// Hide Edit once a timesheet is approved.
    pub lock_edit_after_approval: bool,
    pub max_name_len: usize,
}

impl SimQuirks {
    /// Behaves as documented.
    pub fn strict() -> Self {
        Self {
            trim_before_duplicate_check: true,
            accept_empty_submission: false,
            accept_rows_without_hours: false,
            lock_edit_after_approval: true,
            max_name_len: 50,
        }
    }

    /// Reproduces the defects seen in the live module.
    pub fn observed() -> Self {
        Self {
            trim_before_duplicate_check: false,
            accept_empty_submission: true,
            accept_rows_without_hours: true,
            ..Self::strict()
        }
    }
}

impl Default for SimQuirks {
    fn default() -> Self {
        Self::strict()
    }
}

#[derive(Debug, Clone)]
struct User {
    password: String,
    full_name: String,
}

#[derive(Debug, Clone, Default)]
struct SimTimesheet {
    status: TimesheetStatus,
    rows: Vec<TimesheetRow>,
    comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredEntity {
    kind: EntityKind,
    scope: String,
    name: String,
}

#[derive(Debug)]
struct AppState {
    quirks: SimQuirks,
    users: HashMap<String, User>,
    entities: Vec<StoredEntity>,
    timesheets: HashMap<String, SimTimesheet>,
}

impl AppState {
    fn username_by_full_name(&self, full_name: &str) -> Option<String> {
        self.users
            .iter()
            .find(|(_, u)| u.full_name == full_name.trim())
            .map(|(name, _)| name.clone())
    }
}

/// Shared state of one simulated application instance.
#[derive(Debug, Clone)]
pub struct SimulatedTimeModule {
    state: Arc<Mutex<AppState>>,
    latency: Duration,
}

impl SimulatedTimeModule {
    /// Creates an instance whose only account is the admin (supervisor).
    pub fn new(quirks: SimQuirks, admin: &Credentials) -> Self {
        let mut users = HashMap::new();
        users.insert(
            admin.username.clone(),
            User {
                password: admin.password.clone(),
                full_name: admin.username.clone(),
            },
        );
        Self {
            state: Arc::new(Mutex::new(AppState {
                quirks,
                users,
                entities: Vec::new(),
                timesheets: HashMap::new(),
            })),
            latency: Duration::ZERO,
        }
    }

    /// Delays every confirmation or error text by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// A fresh browser page on this instance.
    pub fn driver(&self) -> SimDriver {
        SimDriver {
            app: self.clone(),
            page: Mutex::new(PageState::default()),
        }
    }

    /// Stored names of every entity of `kind`.
    pub async fn entity_names(&self, kind: EntityKind) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .entities
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.name.clone())
            .collect()
    }

    /// Status of a user's timesheet, if they have one.
    pub async fn timesheet_status(&self, username: &str) -> Option<TimesheetStatus> {
        let state = self.state.lock().await;
        state.timesheets.get(username).map(|t| t.status)
    }

    /// Rejection comment left on a user's timesheet.
    pub async fn rejection_comment(&self, username: &str) -> Option<String> {
        let state = self.state.lock().await;
        state
            .timesheets
            .get(username)
            .and_then(|t| t.comment.clone())
    }
}

#[derive(Debug, Default)]
struct PageState {
    user: Option<String>,
    location: Option<NavTarget>,
    form: HashMap<String, String>,
    flash: Vec<(String, Instant)>,
    viewing: Option<String>,
}

/// One browser page on a [`SimulatedTimeModule`].
pub struct SimDriver {
    app: SimulatedTimeModule,
    page: Mutex<PageState>,
}

impl SimDriver {
    async fn flash(&self, text: impl Into<String>) {
        let at = Instant::now() + self.app.latency;
        self.page.lock().await.flash.push((text.into(), at));
    }

    async fn current_user(&self) -> Result<String> {
        self.page
            .lock()
            .await
            .user
            .clone()
            .ok_or_else(|| Error::driver("not logged in"))
    }

    async fn require_location(&self, target: NavTarget) -> Result<()> {
        let location = self.page.lock().await.location;
        if location != Some(target) {
            return Err(Error::driver(format!(
                "expected to be on {}, but on {}",
                target,
                location.map(|l| l.to_string()).unwrap_or_else(|| "no page".to_string())
            )));
        }
        Ok(())
    }

    async fn visible_texts(&self) -> Vec<String> {
        let page = self.page.lock().await;
        let now = Instant::now();
        let mut texts: Vec<String> = page
            .flash
            .iter()
            .filter(|(_, at)| *at <= now)
            .map(|(t, _)| t.clone())
            .collect();

        let owner = match page.location {
            Some(NavTarget::MyTimesheets) => page.user.clone(),
            Some(NavTarget::EmployeeTimesheets) => page.viewing.clone(),
            _ => None,
        };
        drop(page);

        if let Some(owner) = owner {
            let state = self.app.state.lock().await;
            let status = state
                .timesheets
                .get(&owner)
                .map(|t| t.status)
                .unwrap_or_default();
            texts.push(messages::status_banner(status));
        }
        texts
    }

    async fn form_value(&self, field: &str) -> String {
        self.get_value(field).await.ok().flatten().unwrap_or_default()
    }

    async fn save_entity_form(&self, kind: EntityKind) -> Result<()> {
        let name = self.form_value("name").await;
        let customer = self.form_value("customer").await;
        let project = self.form_value("project").await;
        let activities = self.form_value("activities").await;

        let mut state = self.app.state.lock().await;
        let max = state.quirks.max_name_len;

        let required_missing = name.trim().is_empty()
            || (kind == EntityKind::Project && customer.trim().is_empty())
            || (kind == EntityKind::Activity && project.trim().is_empty());
        let message = if required_missing {
            Some(messages::REQUIRED.to_string())
        } else if name.chars().count() > max {
            Some(messages::too_long(max))
        } else {
            None
        };
        if let Some(message) = message {
            drop(state);
            self.flash(message).await;
            return Ok(());
        }

        let scope = if kind == EntityKind::Activity {
            project.trim().to_string()
        } else {
            String::new()
        };
        let compared = if state.quirks.trim_before_duplicate_check {
            name.trim()
        } else {
            name.as_str()
        };
        let exists = state
            .entities
            .iter()
            .any(|e| e.kind == kind && e.scope == scope && e.name == compared);
        if exists {
            drop(state);
            self.flash(messages::ALREADY_EXISTS).await;
            return Ok(());
        }

        let stored = name.trim().to_string();
        if kind == EntityKind::Project {
            for activity in activities.lines().filter(|a| !a.trim().is_empty()) {
                state.entities.push(StoredEntity {
                    kind: EntityKind::Activity,
                    scope: stored.clone(),
                    name: activity.trim().to_string(),
                });
            }
        }
        state.entities.push(StoredEntity {
            kind,
            scope,
            name: stored,
        });
        drop(state);

        self.flash(messages::SAVED).await;
        Ok(())
    }

    async fn delete_entity_form(&self, kind: EntityKind) -> Result<()> {
        let name = self.form_value("name").await;
        let mut state = self.app.state.lock().await;

        if kind == EntityKind::Employee {
            let username = state
                .username_by_full_name(&name)
                .ok_or_else(|| Error::NotFound {
                    kind: kind.to_string(),
                    name: name.trim().to_string(),
                })?;
            state.users.remove(&username);
            state.timesheets.remove(&username);
        } else {
            let position = state
                .entities
                .iter()
                .position(|e| e.kind == kind && e.name.trim() == name.trim())
                .ok_or_else(|| Error::NotFound {
                    kind: kind.to_string(),
                    name: name.trim().to_string(),
                })?;
            let removed = state.entities.remove(position);
            if kind == EntityKind::Project {
                state
                    .entities
                    .retain(|e| !(e.kind == EntityKind::Activity && e.scope == removed.name));
            }
        }
        drop(state);

        self.flash(messages::DELETED).await;
        Ok(())
    }

    /// Loads the stored entity matching the search field into the form.
    async fn edit_entity_form(&self, kind: EntityKind) -> Result<()> {
        let search = self.form_value("search").await;
        let stored = {
            let state = self.app.state.lock().await;
            state
                .entities
                .iter()
                .find(|e| e.kind == kind && e.name.trim() == search.trim())
                .cloned()
        };
        let stored = stored.ok_or_else(|| Error::NotFound {
            kind: kind.to_string(),
            name: search.trim().to_string(),
        })?;

        let mut page = self.page.lock().await;
        page.form.clear();
        if kind == EntityKind::Activity {
            page.form.insert("project".to_string(), stored.scope);
        }
        page.form.insert("name".to_string(), stored.name);
        Ok(())
    }

    async fn view_employee_timesheet(&self) -> Result<()> {
        let name = self.form_value("employee").await;
        let username = {
            let state = self.app.state.lock().await;
            state
                .username_by_full_name(&name)
                .ok_or_else(|| Error::driver(format!("no employee named '{}'", name)))?
        };
        self.page.lock().await.viewing = Some(username);
        Ok(())
    }

    async fn decide_viewed_timesheet(&self, approve: bool) -> Result<()> {
        let (viewing, comment) = {
            let page = self.page.lock().await;
            (page.viewing.clone(), page.form.get("comment").cloned())
        };
        let viewing = viewing.ok_or_else(|| Error::driver("no timesheet open"))?;

        let mut state = self.app.state.lock().await;
        let sheet = state.timesheets.entry(viewing).or_default();
        if sheet.status != TimesheetStatus::Submitted {
            let control = if approve { "Approve" } else { "Reject" };
            return Err(Error::driver(format!("{} control not available", control)));
        }
        if approve {
            sheet.status = TimesheetStatus::Approved;
        } else {
            sheet.status = TimesheetStatus::Rejected;
            sheet.comment = comment;
        }
        drop(state);

        self.flash(if approve {
            messages::TIMESHEET_APPROVED
        } else {
            messages::TIMESHEET_REJECTED
        })
        .await;
        Ok(())
    }

    async fn entity_page(&self) -> Result<EntityKind> {
        match self.page.lock().await.location {
            Some(NavTarget::Customers) => Ok(EntityKind::Customer),
            Some(NavTarget::Projects) => Ok(EntityKind::Project),
            Some(NavTarget::Activities) => Ok(EntityKind::Activity),
            Some(NavTarget::Employees) => Ok(EntityKind::Employee),
            other => Err(Error::driver(format!("no entity form on {:?}", other))),
        }
    }

    fn tolerated(quirks: &SimQuirks, failure: &GuardFailure) -> bool {
        match failure {
            GuardFailure::EmptyTimesheet => quirks.accept_empty_submission,
            GuardFailure::ZeroHours { .. } => quirks.accept_rows_without_hours,
            _ => false,
        }
    }
}

#[async_trait]
impl PageDriver for SimDriver {
    async fn navigate(&self, target: NavTarget) -> Result<()> {
        let mut page = self.page.lock().await;
        if page.user.is_none() && target != NavTarget::Login {
            return Err(Error::driver(format!("{} requires login", target)));
        }
        page.location = Some(target);
        page.form.clear();
        page.flash.clear();
        page.viewing = None;
        Ok(())
    }

    async fn fill_field(&self, field: &str, value: &str) -> Result<()> {
        let mut page = self.page.lock().await;
        if page.location.is_none() {
            return Err(Error::driver("no page open"));
        }
        page.form.insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn click_control(&self, control: &str) -> Result<()> {
        self.page.lock().await.flash.clear();
        match control {
            "Save" => {
                let kind = self.entity_page().await?;
                self.save_entity_form(kind).await
            }
            "Delete" => {
                let kind = self.entity_page().await?;
                self.delete_entity_form(kind).await
            }
            "Edit" => {
                let kind = self.entity_page().await?;
                self.edit_entity_form(kind).await
            }
            "View" => self.view_employee_timesheet().await,
            "Approve" => self.decide_viewed_timesheet(true).await,
            "Reject" => self.decide_viewed_timesheet(false).await,
            "Submit" => self.submit_timesheet().await,
            other => Err(Error::driver(format!("unknown control '{}'", other))),
        }
    }

    async fn is_visible(&self, text: &str) -> Result<bool> {
        Ok(self.visible_texts().await.iter().any(|t| t.contains(text)))
    }

    async fn get_value(&self, field: &str) -> Result<Option<String>> {
        Ok(self.page.lock().await.form.get(field).cloned())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let location = self.page.lock().await.location;
        let mut body = format!(
            "page: {}\n",
            location.map(|l| l.to_string()).unwrap_or_default()
        );
        for text in self.visible_texts().await {
            body.push_str(&text);
            body.push('\n');
        }
        tokio::fs::write(path, body).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[async_trait]
impl TimeModuleDriver for SimDriver {
    async fn login(&self, credentials: &Credentials) -> Result<()> {
        let ok = {
            let state = self.app.state.lock().await;
            state
                .users
                .get(&credentials.username)
                .map(|u| u.password == credentials.password)
                .unwrap_or(false)
        };
        if !ok {
            return Err(Error::driver("Invalid credentials"));
        }
        let mut page = self.page.lock().await;
        *page = PageState {
            user: Some(credentials.username.clone()),
            location: Some(NavTarget::Dashboard),
            ..PageState::default()
        };
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        let mut page = self.page.lock().await;
        *page = PageState {
            location: Some(NavTarget::Login),
            ..PageState::default()
        };
        Ok(())
    }

    async fn create_entity(&self, spec: &EntitySpec) -> Result<()> {
        let page = NavTarget::for_entity(spec.kind);
        self.require_location(page).await?;
        self.fill_field("name", &spec.name).await?;
        if let Some(description) = &spec.description {
            self.fill_field("description", description).await?;
        }
        if let Some(customer) = &spec.customer {
            self.fill_field("customer", customer).await?;
        }
        if let Some(project) = &spec.project {
            self.fill_field("project", project).await?;
        }
        if !spec.admins.is_empty() {
            self.fill_field("admins", &spec.admins.join("\n")).await?;
        }
        if !spec.activities.is_empty() {
            self.fill_field("activities", &spec.activities.join("\n"))
                .await?;
        }
        self.click_control("Save").await
    }

    async fn create_employee(&self, identity: &EmployeeIdentity) -> Result<()> {
        self.require_location(NavTarget::Employees).await?;
        let added = {
            let mut state = self.app.state.lock().await;
            if state.users.contains_key(&identity.username) {
                false
            } else {
                state.users.insert(
                    identity.username.clone(),
                    User {
                        password: identity.password.clone(),
                        full_name: identity.full_name(),
                    },
                );
                true
            }
        };
        self.page.lock().await.flash.clear();
        self.flash(if added {
            messages::SAVED
        } else {
            messages::ALREADY_EXISTS
        })
        .await;
        Ok(())
    }

    async fn open_entity(&self, kind: EntityKind, name: &str) -> Result<()> {
        self.require_location(NavTarget::for_entity(kind)).await?;
        self.fill_field("search", name).await?;
        self.click_control("Edit").await
    }

    async fn delete_entity(&self, kind: EntityKind, name: &str) -> Result<()> {
        self.navigate(NavTarget::for_entity(kind)).await?;
        self.fill_field("name", name).await?;
        self.click_control("Delete").await
    }

    async fn save_timesheet(&self, rows: &[TimesheetRow]) -> Result<()> {
        self.require_location(NavTarget::MyTimesheets).await?;
        let user = self.current_user().await?;
        self.page.lock().await.flash.clear();

        let mut state = self.app.state.lock().await;
        let quirks = state.quirks.clone();
        let sheet = state.timesheets.entry(user).or_default();
        let editable = match sheet.status {
            TimesheetStatus::NotSubmitted | TimesheetStatus::Rejected => true,
            TimesheetStatus::Approved => !quirks.lock_edit_after_approval,
            TimesheetStatus::Submitted => false,
        };
        if !editable {
            return Err(Error::driver("Edit control not available"));
        }

        let message = match check_rows(rows) {
            Err(failure) if !Self::tolerated(&quirks, &failure) => failure.message(),
            _ => {
                sheet.rows = rows.to_vec();
                sheet.status = TimesheetStatus::NotSubmitted;
                messages::SAVED
            }
        };
        drop(state);

        self.flash(message).await;
        Ok(())
    }

    async fn submit_timesheet(&self) -> Result<()> {
        self.require_location(NavTarget::MyTimesheets).await?;
        let user = self.current_user().await?;
        self.page.lock().await.flash.clear();

        let mut state = self.app.state.lock().await;
        let quirks = state.quirks.clone();
        let sheet = state.timesheets.entry(user).or_default();
        if sheet.status != TimesheetStatus::NotSubmitted {
            return Err(Error::driver("Submit control not available"));
        }

        let message = match check_submittable(&sheet.rows) {
            Err(failure) if !Self::tolerated(&quirks, &failure) => failure.message(),
            _ => {
                sheet.status = TimesheetStatus::Submitted;
                messages::SUBMITTED
            }
        };
        drop(state);

        self.flash(message).await;
        Ok(())
    }

    async fn approve_timesheet(&self, employee: &str) -> Result<()> {
        self.require_location(NavTarget::EmployeeTimesheets).await?;
        self.fill_field("employee", employee).await?;
        self.click_control("View").await?;
        self.click_control("Approve").await
    }

    async fn reject_timesheet(&self, employee: &str, comment: Option<&str>) -> Result<()> {
        self.require_location(NavTarget::EmployeeTimesheets).await?;
        self.fill_field("employee", employee).await?;
        self.click_control("View").await?;
        if let Some(comment) = comment {
            self.fill_field("comment", comment).await?;
        }
        self.click_control("Reject").await
    }

    async fn edit_available(&self) -> Result<bool> {
        self.require_location(NavTarget::MyTimesheets).await?;
        let user = self.current_user().await?;
        let state = self.app.state.lock().await;
        let status = state
            .timesheets
            .get(&user)
            .map(|t| t.status)
            .unwrap_or_default();
        Ok(match status {
            TimesheetStatus::NotSubmitted | TimesheetStatus::Rejected => true,
            TimesheetStatus::Approved => !state.quirks.lock_edit_after_approval,
            TimesheetStatus::Submitted => false,
        })
    }

    async fn total_hours(&self) -> Result<Option<String>> {
        self.require_location(NavTarget::MyTimesheets).await?;
        let user = self.current_user().await?;
        let state = self.app.state.lock().await;
        Ok(state.timesheets.get(&user).map(|t| {
            let minutes = t
                .rows
                .iter()
                .map(|r| r.total_minutes().unwrap_or(0))
                .fold(0, u32::saturating_add);
            format_hours(minutes)
        }))
    }
}
