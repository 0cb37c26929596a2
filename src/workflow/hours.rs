//! Timesheet rows, hour parsing and row guards.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::messages;

/// Minutes in the longest permitted day.
const DAY_LIMIT_MINUTES: u32 = 24 * 60;

/// Day column of a weekly timesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    #[serde(alias = "mon", alias = "Monday", alias = "monday")]
    Mon,
    #[serde(alias = "tue", alias = "Tuesday", alias = "tuesday")]
    Tue,
    #[serde(alias = "wed", alias = "Wednesday", alias = "wednesday")]
    Wed,
    #[serde(alias = "thu", alias = "Thursday", alias = "thursday")]
    Thu,
    #[serde(alias = "fri", alias = "Friday", alias = "friday")]
    Fri,
    #[serde(alias = "sat", alias = "Saturday", alias = "saturday")]
    Sat,
    #[serde(alias = "sun", alias = "Sunday", alias = "sunday")]
    Sun,
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Day::Mon => "Mon",
            Day::Tue => "Tue",
            Day::Wed => "Wed",
            Day::Thu => "Thu",
            Day::Fri => "Fri",
            Day::Sat => "Sat",
            Day::Sun => "Sun",
        };
        f.write_str(name)
    }
}

/// One project/activity row with the hours typed into each day cell.
///
/// Hours are kept as entered so that malformed input reaches the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimesheetRow {
    pub project: String,
    pub activity: String,
    #[serde(default)]
    pub hours: BTreeMap<Day, String>,
}

impl TimesheetRow {
    /// Creates a row with no hours.
    pub fn new(project: impl Into<String>, activity: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            activity: activity.into(),
            hours: BTreeMap::new(),
        }
    }

    /// Sets the hours typed into one day cell.
    pub fn with_hours(mut self, day: Day, hours: impl Into<String>) -> Self {
        self.hours.insert(day, hours.into());
        self
    }

    /// Sum of the row in minutes, or the first cell that fails to parse.
    pub fn total_minutes(&self) -> Result<u32, (Day, String)> {
        let mut total: u32 = 0;
        for (day, raw) in &self.hours {
            total = total.saturating_add(parse_hours(raw).map_err(|_| (*day, raw.clone()))?);
        }
        Ok(total)
    }
}

/// Why a cell could not be read as hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoursError {
    /// Not decimal or HH:MM, or negative.
    Format,
}

/// Parses a cell as minutes.
///
/// Accepts decimal hours (`7.5`) and `HH:MM` (`7:30`). Blank cells are zero.
/// Values are not range-checked here; see [`check_rows`]. Values too large
/// to count saturate at `u32::MAX` so they still fail the day limit.
pub fn parse_hours(raw: &str) -> Result<u32, HoursError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }

    if let Some((h, m)) = raw.split_once(':') {
        if h.is_empty() || m.len() != 2 || !all_digits(h) || !all_digits(m) {
            return Err(HoursError::Format);
        }
        // Digits only, so the parse can only fail on overflow.
        let hours: u32 = h.parse().unwrap_or(u32::MAX);
        let minutes: u32 = m.parse().map_err(|_| HoursError::Format)?;
        if minutes >= 60 {
            return Err(HoursError::Format);
        }
        return Ok(hours.saturating_mul(60).saturating_add(minutes));
    }

    let mut dots = 0;
    for c in raw.chars() {
        match c {
            '.' => dots += 1,
            c if c.is_ascii_digit() => {}
            _ => return Err(HoursError::Format),
        }
    }
    if dots > 1 || raw == "." {
        return Err(HoursError::Format);
    }

    let value: f64 = raw.parse().map_err(|_| HoursError::Format)?;
    Ok((value * 60.0).round() as u32)
}

fn all_digits(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_digit())
}

/// Formats minutes as decimal hours with two places (`"15.50"`).
pub fn format_hours(minutes: u32) -> String {
    format!("{:.2}", minutes as f64 / 60.0)
}

/// A row guard that was not met.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardFailure {
    /// Submit with no rows at all.
    EmptyTimesheet,
    /// Project or activity left blank.
    MissingField { row: usize, field: &'static str },
    /// A cell that is not decimal or HH:MM, or is negative.
    InvalidHours { row: usize, day: Day, value: String },
    /// A cell, or a day summed across rows, reaching past 24 hours.
    ExceedsDailyMax { day: Day, minutes: u32 },
    /// A row whose hours add up to zero.
    ZeroHours { row: usize },
}

impl GuardFailure {
    /// The validation text the module shows for this failure.
    pub fn message(&self) -> &'static str {
        match self {
            GuardFailure::EmptyTimesheet => messages::EMPTY_TIMESHEET,
            GuardFailure::MissingField { .. } | GuardFailure::ZeroHours { .. } => {
                messages::REQUIRED
            }
            GuardFailure::InvalidHours { .. } => messages::INVALID_HOURS,
            GuardFailure::ExceedsDailyMax { .. } => messages::EXCEEDS_DAILY_MAX,
        }
    }
}

impl fmt::Display for GuardFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardFailure::EmptyTimesheet => write!(f, "timesheet has no rows"),
            GuardFailure::MissingField { row, field } => {
                write!(f, "row {} is missing {}", row + 1, field)
            }
            GuardFailure::InvalidHours { row, day, value } => {
                write!(f, "row {} {}: '{}' is not valid hours", row + 1, day, value)
            }
            GuardFailure::ExceedsDailyMax { day, minutes } => {
                write!(f, "{} totals {} hours", day, format_hours(*minutes))
            }
            GuardFailure::ZeroHours { row } => write!(f, "row {} has no hours", row + 1),
        }
    }
}

/// Checks the row guard shared by Save and Submit.
///
/// Returns the first failure in row order; a day column is checked after
/// every cell of it has parsed.
pub fn check_rows(rows: &[TimesheetRow]) -> Result<(), GuardFailure> {
    let mut per_day: BTreeMap<Day, u32> = BTreeMap::new();

    for (i, row) in rows.iter().enumerate() {
        if row.project.trim().is_empty() {
            return Err(GuardFailure::MissingField {
                row: i,
                field: "project",
            });
        }
        if row.activity.trim().is_empty() {
            return Err(GuardFailure::MissingField {
                row: i,
                field: "activity",
            });
        }

        let mut row_total = 0;
        for (day, raw) in &row.hours {
            let minutes = parse_hours(raw).map_err(|_| GuardFailure::InvalidHours {
                row: i,
                day: *day,
                value: raw.clone(),
            })?;
            if minutes >= DAY_LIMIT_MINUTES {
                return Err(GuardFailure::ExceedsDailyMax { day: *day, minutes });
            }
            row_total += minutes;
            *per_day.entry(*day).or_insert(0) += minutes;
        }

        if row_total == 0 {
            return Err(GuardFailure::ZeroHours { row: i });
        }
    }

    for (day, minutes) in per_day {
        if minutes > DAY_LIMIT_MINUTES {
            return Err(GuardFailure::ExceedsDailyMax { day, minutes });
        }
    }

    Ok(())
}

/// Checks the Submit guard: at least one row, then the row guard.
pub fn check_submittable(rows: &[TimesheetRow]) -> Result<(), GuardFailure> {
    if rows.is_empty() {
        return Err(GuardFailure::EmptyTimesheet);
    }
    check_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(hours: &[(Day, &str)]) -> TimesheetRow {
        hours
            .iter()
            .fold(TimesheetRow::new("ACME Web", "Development"), |r, (d, h)| {
                r.with_hours(*d, *h)
            })
    }

    #[test]
    fn parses_decimal_and_clock_formats() {
        assert_eq!(parse_hours("4"), Ok(240));
        assert_eq!(parse_hours("7.5"), Ok(450));
        assert_eq!(parse_hours("7:30"), Ok(450));
        assert_eq!(parse_hours(".25"), Ok(15));
        assert_eq!(parse_hours("  "), Ok(0));
    }

    #[test]
    fn rejects_negative_and_text() {
        assert_eq!(parse_hours("-2"), Err(HoursError::Format));
        assert_eq!(parse_hours("abc"), Err(HoursError::Format));
        assert_eq!(parse_hours("inf"), Err(HoursError::Format));
        assert_eq!(parse_hours("1.2.3"), Err(HoursError::Format));
        assert_eq!(parse_hours("7:5"), Err(HoursError::Format));
        assert_eq!(parse_hours("7:75"), Err(HoursError::Format));
    }

    #[test]
    fn oversized_clock_value_saturates() {
        assert_eq!(parse_hours("71582789:00"), Ok(u32::MAX));
        assert_eq!(parse_hours("99999999999999:30"), Ok(u32::MAX));

        let rows = vec![row(&[(Day::Thu, "71582789:00")])];
        let failure = check_rows(&rows).unwrap_err();
        assert_eq!(
            failure,
            GuardFailure::ExceedsDailyMax {
                day: Day::Thu,
                minutes: u32::MAX
            }
        );
        assert_eq!(failure.message(), messages::EXCEEDS_DAILY_MAX);
        assert_eq!(rows[0].total_minutes(), Ok(u32::MAX));
    }

    #[test]
    fn valid_rows_pass() {
        let rows = vec![row(&[(Day::Mon, "4"), (Day::Tue, "4")])];
        assert_eq!(check_rows(&rows), Ok(()));
        assert_eq!(check_submittable(&rows), Ok(()));
    }

    #[test]
    fn empty_timesheet_is_not_submittable() {
        assert_eq!(check_rows(&[]), Ok(()));
        assert_eq!(check_submittable(&[]), Err(GuardFailure::EmptyTimesheet));
    }

    #[test]
    fn zero_hour_row_is_rejected() {
        let rows = vec![row(&[(Day::Mon, "0"), (Day::Tue, "")])];
        let failure = check_rows(&rows).unwrap_err();
        assert_eq!(failure, GuardFailure::ZeroHours { row: 0 });
        assert_eq!(failure.message(), messages::REQUIRED);
    }

    #[test]
    fn twenty_four_hours_in_a_cell_is_too_many() {
        let rows = vec![row(&[(Day::Wed, "24")])];
        let failure = check_rows(&rows).unwrap_err();
        assert_eq!(failure.message(), messages::EXCEEDS_DAILY_MAX);
    }

    #[test]
    fn day_column_is_summed_across_rows() {
        let rows = vec![
            row(&[(Day::Mon, "16")]),
            TimesheetRow::new("ACME Web", "QA").with_hours(Day::Mon, "9"),
        ];
        assert_eq!(
            check_rows(&rows),
            Err(GuardFailure::ExceedsDailyMax {
                day: Day::Mon,
                minutes: 25 * 60
            })
        );
    }

    #[test]
    fn negative_hours_use_format_message() {
        let rows = vec![row(&[(Day::Fri, "-3")])];
        assert_eq!(check_rows(&rows).unwrap_err().message(), messages::INVALID_HOURS);
    }

    #[test]
    fn missing_activity_is_required() {
        let rows = vec![TimesheetRow::new("ACME Web", " ").with_hours(Day::Mon, "1")];
        assert_eq!(
            check_rows(&rows),
            Err(GuardFailure::MissingField {
                row: 0,
                field: "activity"
            })
        );
    }

    #[test]
    fn day_keys_deserialize_from_fixture_spelling() {
        let json = r#"{"project":"P","activity":"A","hours":{"Mon":"4","tuesday":"3.5"}}"#;
        let row: TimesheetRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.total_minutes(), Ok(450));
        assert_eq!(format_hours(450), "7.50");
    }
}
