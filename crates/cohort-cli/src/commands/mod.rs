pub mod archive;
pub mod intervention;
pub mod participant;
pub mod pending;
pub mod reconcile;
pub mod schedule;
pub mod study;
pub mod survey;

use chrono::{NaiveTime, Timelike, Weekday};
use cohort_core::model::TimeOfDay;
use cohort_core::ScheduleKind;

/// Parse a weekday name ("monday", "mon", case-insensitive).
pub fn parse_weekday(s: &str) -> Result<Weekday, String> {
    s.parse::<Weekday>()
        .map_err(|_| format!("invalid weekday: {s}"))
}

/// Parse an "HH:MM" wall-clock time.
pub fn parse_time_of_day(s: &str) -> Result<TimeOfDay, String> {
    let t = NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| format!("invalid time: {s}"))?;
    Ok(TimeOfDay::new(t.hour(), t.minute()))
}

/// Parse a schedule kind filter.
pub fn parse_kind(s: &str) -> Result<ScheduleKind, String> {
    match s {
        "weekly" => Ok(ScheduleKind::Weekly),
        "absolute" => Ok(ScheduleKind::Absolute),
        "relative" => Ok(ScheduleKind::Relative),
        other => Err(format!(
            "invalid kind: {other} (expected weekly, absolute, or relative)"
        )),
    }
}
