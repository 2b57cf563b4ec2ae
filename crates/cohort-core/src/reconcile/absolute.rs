//! Absolute schedule reconciliation.
//!
//! An absolute schedule is a single fixed instant, so re-offering a
//! delivered one would be a duplicate notification. Participants with
//! an archived delivery attempt at the schedule's exact instant are
//! excluded from the rebuild.
//!
//! Legacy rows can hold a timezone-naive time; those are resolved in
//! the study timezone and the corrected value written back, so each
//! row is healed at most once.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::CoreError;
use crate::model::{ScheduleKind, ScheduleSource, ScheduledEvent, Survey};
use crate::storage::StudyStore;

/// Rebuild the absolute slice of the pending table for one survey.
///
/// Returns the number of events created. A survey with no absolute
/// schedules ends up with an empty absolute slice.
pub fn reconcile(
    store: &StudyStore,
    survey: &Survey,
    tz: Tz,
    participant: Option<&str>,
) -> Result<usize, CoreError> {
    let schedules = store.absolute_schedules_of_survey(&survey.id)?;

    let participants: Vec<String> = match participant {
        Some(id) => vec![id.to_string()],
        None => store
            .participants_of_study(&survey.study_id)?
            .into_iter()
            .map(|p| p.id)
            .collect(),
    };

    let mut events = Vec::new();
    // Two schedules can resolve to the identical instant; the pending
    // table is unique on (participant, kind, time), so collapse such
    // pairs to one event tagged to the first schedule defined.
    let mut seen: HashSet<(String, DateTime<Utc>)> = HashSet::new();
    for schedule in &schedules {
        let needs_heal = schedule.scheduled_time.is_naive();
        let when = schedule.scheduled_time.normalize(tz)?;
        if needs_heal {
            store.update_absolute_schedule_time(&schedule.id, when)?;
        }

        let archived: HashSet<String> = store
            .archived_participants_at(&survey.id, when)?
            .into_iter()
            .collect();

        for participant_id in &participants {
            if archived.contains(participant_id) {
                continue;
            }
            if !seen.insert((participant_id.clone(), when)) {
                continue;
            }
            events.push(ScheduledEvent::new(
                &survey.id,
                participant_id,
                ScheduleSource::Absolute {
                    schedule_id: schedule.id.clone(),
                },
                when,
            ));
        }
    }

    let created = store.replace_pending(
        &survey.id,
        participant,
        Some(ScheduleKind::Absolute),
        &events,
    )?;
    Ok(created)
}
