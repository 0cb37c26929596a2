//! Visible texts of the Time module.
//!
//! Outcomes are observed by the text the application shows, so the model and
//! the simulated module share one vocabulary.

pub const SAVED: &str = "Successfully Saved";
pub const SUBMITTED: &str = "Successfully Submitted";
pub const DELETED: &str = "Successfully Deleted";
pub const TIMESHEET_APPROVED: &str = "Timesheet Approved";
pub const TIMESHEET_REJECTED: &str = "Timesheet Rejected";

pub const REQUIRED: &str = "Required";
pub const ALREADY_EXISTS: &str = "Already exists";
pub const INVALID_HOURS: &str = "Should Be Less Than 24 and in HH:MM or Decimal Format";
pub const EXCEEDS_DAILY_MAX: &str = "Should not exceed 24";
pub const EMPTY_TIMESHEET: &str = "Timesheet is empty";

/// Message shown when a name is longer than the field allows.
pub fn too_long(max: usize) -> String {
    format!("Should not exceed {} characters", max)
}

/// Status banner shown on a timesheet page.
pub fn status_banner(status: impl std::fmt::Display) -> String {
    format!("Status: {}", status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_long_matches_module_wording() {
        assert_eq!(too_long(50), "Should not exceed 50 characters");
    }
}
