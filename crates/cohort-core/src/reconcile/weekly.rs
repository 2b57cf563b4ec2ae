//! Weekly schedule reconciliation.
//!
//! Each participant gets exactly one pending weekly event per survey:
//! the single next upcoming occurrence across all of the survey's
//! weekly rules. Weekly events are recurring, so the archive is never
//! consulted here; a delivered occurrence is simply succeeded by the
//! next one.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::error::{CoreError, ScheduleError};
use crate::model::{ScheduleSource, ScheduledEvent, Survey, WeeklySchedule};
use crate::storage::StudyStore;

/// Pick the next occurrence at or after `now` across all rules.
///
/// An occurrence falling exactly on `now` counts as upcoming. Rules
/// resolving to the identical instant tie-break toward the first in
/// definition order (strict less-than keeps the earlier winner).
///
/// # Errors
/// Returns `NoWeeklySchedules` for an empty rule list.
pub fn next_weekly_event<'s>(
    schedules: &'s [WeeklySchedule],
    now: DateTime<Tz>,
) -> Result<(DateTime<Tz>, &'s WeeklySchedule), ScheduleError> {
    let mut best: Option<(DateTime<Tz>, &WeeklySchedule)> = None;
    for schedule in schedules {
        let (prior, next) = schedule.occurrences_around(now)?;
        let upcoming = if prior >= now { prior } else { next };
        match &best {
            Some((current, _)) if upcoming >= *current => {}
            _ => best = Some((upcoming, schedule)),
        }
    }
    best.ok_or_else(|| ScheduleError::NoWeeklySchedules {
        survey_id: schedules
            .first()
            .map(|s| s.survey_id.clone())
            .unwrap_or_default(),
    })
}

/// Rebuild the weekly slice of the pending table for one survey.
///
/// Returns the number of events created.
pub fn reconcile(
    store: &StudyStore,
    survey: &Survey,
    now: DateTime<Tz>,
    participant: Option<&str>,
) -> Result<usize, CoreError> {
    let schedules = store.weekly_schedules_of_survey(&survey.id)?;
    if schedules.is_empty() {
        return Err(ScheduleError::NoWeeklySchedules {
            survey_id: survey.id.clone(),
        }
        .into());
    }

    let participants: Vec<String> = match participant {
        Some(id) => vec![id.to_string()],
        None => store
            .participants_of_study(&survey.study_id)?
            .into_iter()
            .map(|p| p.id)
            .collect(),
    };

    // The winning occurrence is the same for every participant.
    let (when, schedule) = next_weekly_event(&schedules, now)?;
    let when = when.with_timezone(&chrono::Utc);

    let mut events = Vec::with_capacity(participants.len());
    for participant_id in &participants {
        events.push(ScheduledEvent::new(
            &survey.id,
            participant_id,
            ScheduleSource::Weekly {
                schedule_id: schedule.id.clone(),
            },
            when,
        ));
    }

    let created = store.replace_pending(
        &survey.id,
        participant,
        Some(crate::model::ScheduleKind::Weekly),
        &events,
    )?;
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{localize, TimeOfDay};
    use chrono::{NaiveDate, Weekday};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        localize(
            chrono_tz::UTC,
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn picks_soonest_rule_across_days() {
        // Now: Tuesday 2024-06-04 10:00. Friday 09:00 beats next Monday.
        let monday = WeeklySchedule::new("s", Weekday::Mon, TimeOfDay::new(9, 0), 0);
        let friday = WeeklySchedule::new("s", Weekday::Fri, TimeOfDay::new(9, 0), 1);
        let rules = [monday, friday.clone()];
        let (when, winner) = next_weekly_event(&rules, at(2024, 6, 4, 10, 0)).unwrap();
        assert_eq!(when, at(2024, 6, 7, 9, 0));
        assert_eq!(winner.id, friday.id);
    }

    #[test]
    fn occurrence_exactly_now_counts_as_upcoming() {
        let ws = WeeklySchedule::new("s", Weekday::Tue, TimeOfDay::new(10, 0), 0);
        let now = at(2024, 6, 4, 10, 0); // Tuesday 10:00 sharp
        let (when, _) = next_weekly_event(std::slice::from_ref(&ws), now).unwrap();
        assert_eq!(when, now);
    }

    #[test]
    fn identical_instants_tie_break_to_definition_order() {
        let first = WeeklySchedule::new("s", Weekday::Fri, TimeOfDay::new(9, 0), 0);
        let second = WeeklySchedule::new("s", Weekday::Fri, TimeOfDay::new(9, 0), 1);
        let rules = [first.clone(), second];
        let (_, winner) = next_weekly_event(&rules, at(2024, 6, 4, 10, 0)).unwrap();
        assert_eq!(winner.id, first.id);
    }

    #[test]
    fn empty_rule_list_is_an_error() {
        let err = next_weekly_event(&[], at(2024, 6, 4, 10, 0)).unwrap_err();
        assert!(matches!(err, ScheduleError::NoWeeklySchedules { .. }));
    }
}
