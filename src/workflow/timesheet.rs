//! Timesheet lifecycle model.
//!
//! The model is pure: it maps `(status, actor, action, rows)` to the next
//! status or the reason the action is refused. The scenario runner performs
//! the real action separately and reconciles what it sees against this.
//!
//! ```text
//! NotSubmitted --Save(E)--> NotSubmitted
//! NotSubmitted --Submit(E)--> Submitted
//! Submitted --Approve(S)--> Approved   (terminal)
//! Submitted --Reject(S)--> Rejected
//! Rejected --Save(E)--> NotSubmitted
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::hours::{check_rows, check_submittable, GuardFailure, TimesheetRow};
use crate::error::Error;

/// An authenticated role taking part in a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Employee,
    Supervisor,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Employee => write!(f, "employee"),
            Actor::Supervisor => write!(f, "supervisor"),
        }
    }
}

/// Status of a timesheet as shown in its status banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimesheetStatus {
    #[default]
    #[serde(alias = "Not Submitted")]
    NotSubmitted,
    #[serde(alias = "Submitted")]
    Submitted,
    #[serde(alias = "Approved")]
    Approved,
    #[serde(alias = "Rejected")]
    Rejected,
}

impl TimesheetStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [TimesheetStatus; 4] = [
        TimesheetStatus::NotSubmitted,
        TimesheetStatus::Submitted,
        TimesheetStatus::Approved,
        TimesheetStatus::Rejected,
    ];

    /// No transition leaves a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, TimesheetStatus::Approved)
    }

    /// Whether the employee's Edit control should be offered.
    pub fn is_editable(self) -> bool {
        matches!(self, TimesheetStatus::NotSubmitted | TimesheetStatus::Rejected)
    }
}

impl fmt::Display for TimesheetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimesheetStatus::NotSubmitted => write!(f, "Not Submitted"),
            TimesheetStatus::Submitted => write!(f, "Submitted"),
            TimesheetStatus::Approved => write!(f, "Approved"),
            TimesheetStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

impl FromStr for TimesheetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "notsubmitted" => Ok(TimesheetStatus::NotSubmitted),
            "submitted" => Ok(TimesheetStatus::Submitted),
            "approved" => Ok(TimesheetStatus::Approved),
            "rejected" => Ok(TimesheetStatus::Rejected),
            _ => Err(format!("unknown timesheet status: {}", s)),
        }
    }
}

/// An action on a timesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimesheetAction {
    /// Create or edit rows, then save.
    Save,
    Submit,
    Approve,
    Reject,
}

impl TimesheetAction {
    /// The only role allowed to perform the action.
    pub fn actor(self) -> Actor {
        match self {
            TimesheetAction::Save | TimesheetAction::Submit => Actor::Employee,
            TimesheetAction::Approve | TimesheetAction::Reject => Actor::Supervisor,
        }
    }
}

impl fmt::Display for TimesheetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimesheetAction::Save => write!(f, "save"),
            TimesheetAction::Submit => write!(f, "submit"),
            TimesheetAction::Approve => write!(f, "approve"),
            TimesheetAction::Reject => write!(f, "reject"),
        }
    }
}

/// Why the model refused an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The transition exists but its guard failed.
    Guard {
        action: TimesheetAction,
        failure: GuardFailure,
    },
    /// No such transition from this status for this actor.
    Illegal {
        from: TimesheetStatus,
        action: TimesheetAction,
        actor: Actor,
    },
}

impl From<TransitionError> for Error {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Guard { action, failure } => Error::GuardViolation {
                action: action.to_string(),
                message: format!("{} ({})", failure.message(), failure),
            },
            TransitionError::Illegal {
                from,
                action,
                actor,
            } => Error::IllegalTransition {
                action: action.to_string(),
                from: from.to_string(),
                actor: actor.to_string(),
            },
        }
    }
}

/// Computes the status after `actor` performs `action`.
///
/// `rows` are the rows being saved for [`TimesheetAction::Save`] and the
/// stored rows for [`TimesheetAction::Submit`]; they are ignored otherwise.
pub fn next_status(
    from: TimesheetStatus,
    actor: Actor,
    action: TimesheetAction,
    rows: &[TimesheetRow],
) -> Result<TimesheetStatus, TransitionError> {
    use TimesheetAction::*;
    use TimesheetStatus::*;

    let illegal = TransitionError::Illegal {
        from,
        action,
        actor,
    };
    if actor != action.actor() {
        return Err(illegal);
    }

    let guard = |failure: GuardFailure| TransitionError::Guard { action, failure };
    match (from, action) {
        (NotSubmitted | Rejected, Save) => {
            check_rows(rows).map_err(guard)?;
            Ok(NotSubmitted)
        }
        (NotSubmitted, Submit) => {
            check_submittable(rows).map_err(guard)?;
            Ok(Submitted)
        }
        (Submitted, Approve) => Ok(Approved),
        (Submitted, Reject) => Ok(Rejected),
        _ => Err(illegal),
    }
}

/// A recorded status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: TimesheetStatus,
    pub to: TimesheetStatus,
    pub action: TimesheetAction,
    pub actor: Actor,
}

/// Predicted state of one employee's timesheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timesheet {
    status: TimesheetStatus,
    rows: Vec<TimesheetRow>,
    log: Vec<TransitionRecord>,
}

impl Timesheet {
    /// A fresh, unsaved timesheet.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> TimesheetStatus {
        self.status
    }

    pub fn rows(&self) -> &[TimesheetRow] {
        &self.rows
    }

    /// Transitions taken so far, oldest first.
    pub fn log(&self) -> &[TransitionRecord] {
        &self.log
    }

    /// Whether the timesheet ever entered `status`.
    pub fn has_entered(&self, status: TimesheetStatus) -> bool {
        self.log.iter().any(|r| r.to == status)
    }

    /// Computes the outcome of an action without applying it.
    pub fn predict(
        &self,
        actor: Actor,
        action: TimesheetAction,
        new_rows: Option<&[TimesheetRow]>,
    ) -> Result<TimesheetStatus, TransitionError> {
        let rows = match (action, new_rows) {
            (TimesheetAction::Save, Some(rows)) => rows,
            _ => &self.rows,
        };
        next_status(self.status, actor, action, rows)
    }

    /// Applies an action. A refused action leaves the timesheet untouched.
    pub fn apply(
        &mut self,
        actor: Actor,
        action: TimesheetAction,
        new_rows: Option<Vec<TimesheetRow>>,
    ) -> Result<TimesheetStatus, TransitionError> {
        let to = self.predict(actor, action, new_rows.as_deref())?;
        if let (TimesheetAction::Save, Some(rows)) = (action, new_rows) {
            self.rows = rows;
        }
        self.log.push(TransitionRecord {
            from: self.status,
            to,
            action,
            actor,
        });
        self.status = to;
        Ok(to)
    }

    /// Total of all rows in minutes. Rows only enter through a passed guard.
    pub fn total_minutes(&self) -> u32 {
        self.rows
            .iter()
            .map(|r| r.total_minutes().unwrap_or(0))
            .fold(0, u32::saturating_add)
    }
}
