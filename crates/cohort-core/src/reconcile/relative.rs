//! Relative schedule reconciliation.
//!
//! A relative schedule fires a fixed number of days from a
//! participant's intervention date. Participants whose date is still
//! unset are skipped entirely (their events appear on a later run, once
//! the date is recorded), and delivered instants are excluded via the
//! archive just like absolute schedules.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::CoreError;
use crate::model::{ScheduleKind, ScheduleSource, ScheduledEvent, Survey};
use crate::storage::StudyStore;

/// Rebuild the relative slice of the pending table for one survey.
///
/// Returns the number of events created.
pub fn reconcile(
    store: &StudyStore,
    survey: &Survey,
    tz: Tz,
    participant: Option<&str>,
) -> Result<usize, CoreError> {
    let schedules = store.relative_schedules_of_survey(&survey.id)?;

    let mut events = Vec::new();
    // Offsets against different interventions can land on the same
    // (participant, instant); collapse those to one event, first
    // schedule in definition order winning, to honor the pending-table
    // uniqueness constraint.
    let mut seen: HashSet<(String, DateTime<Utc>)> = HashSet::new();
    for schedule in &schedules {
        // Only participants with a recorded date; unset dates yield
        // nothing rather than an error.
        let dates = store.intervention_dates_for(&schedule.intervention_id, participant)?;
        for (participant_id, date) in dates {
            let when = schedule.scheduled_time(date, tz)?;
            if store.archived_exists(&participant_id, &survey.id, when)? {
                continue;
            }
            if !seen.insert((participant_id.clone(), when)) {
                continue;
            }
            events.push(ScheduledEvent::new(
                &survey.id,
                &participant_id,
                ScheduleSource::Relative {
                    schedule_id: schedule.id.clone(),
                },
                when,
            ));
        }
    }

    let created = store.replace_pending(
        &survey.id,
        participant,
        Some(ScheduleKind::Relative),
        &events,
    )?;
    Ok(created)
}
