//! Timesheet workflow model: rows, guards and the status state machine.

pub mod hours;
pub mod timesheet;

pub use hours::{check_rows, check_submittable, format_hours, parse_hours, Day, GuardFailure, TimesheetRow};
pub use timesheet::{
    next_status, Actor, Timesheet, TimesheetAction, TimesheetStatus, TransitionError,
    TransitionRecord,
};
