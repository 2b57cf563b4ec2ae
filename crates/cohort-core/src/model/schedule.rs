//! Schedule definition types: weekly recurrence rules, fixed absolute
//! times, and intervention-relative offsets.
//!
//! Weekly schedules are pure recurrence rules -- no occurrence list is
//! ever materialized. `occurrences_around` computes the two occurrences
//! bracketing a given instant and the reconciler picks between them.

use chrono::offset::LocalResult;
use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScheduleError;

/// Wall-clock time of day for a schedule definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    /// Convert to a NaiveTime, clamping out-of-range stored values.
    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour.min(23), self.minute.min(59), 0).unwrap_or_default()
    }
}

/// Resolve a wall-clock time in `tz`, handling DST transitions.
///
/// Ambiguous times (fall-back fold) resolve to the earliest candidate.
/// Nonexistent times (spring-forward gap) are pushed one hour later.
///
/// # Errors
/// Returns `ScheduleError::UnresolvableLocalTime` if the time still
/// cannot be resolved after the gap adjustment.
pub fn localize(tz: Tz, local: NaiveDateTime) -> Result<DateTime<Tz>, ScheduleError> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _latest) => Ok(earliest),
        LocalResult::None => tz
            .from_local_datetime(&(local + Duration::hours(1)))
            .earliest()
            .ok_or(ScheduleError::UnresolvableLocalTime {
                local,
                timezone: tz,
            }),
    }
}

/// Day-of-week plus time-of-day recurrence rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub id: String,
    pub survey_id: String,
    pub day_of_week: Weekday,
    pub time: TimeOfDay,
    /// Definition order within the survey; ties between schedules that
    /// resolve to the identical instant break toward the lowest position.
    pub position: i64,
}

impl WeeklySchedule {
    pub fn new(
        survey_id: impl Into<String>,
        day_of_week: Weekday,
        time: TimeOfDay,
        position: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            survey_id: survey_id.into(),
            day_of_week,
            time,
            position,
        }
    }

    /// The occurrences of this rule bracketing `now`: the most recent
    /// one at or before `now`, and the next one strictly after it.
    ///
    /// Both are localized separately since their UTC offsets can differ
    /// across a DST transition.
    pub fn occurrences_around(
        &self,
        now: DateTime<Tz>,
    ) -> Result<(DateTime<Tz>, DateTime<Tz>), ScheduleError> {
        let tz = now.timezone();
        let day_delta = self.day_of_week.num_days_from_sunday() as i64
            - now.weekday().num_days_from_sunday() as i64;
        let this_week_date = now.date_naive() + Duration::days(day_delta);
        let this_week = this_week_date.and_time(self.time.to_naive_time());

        let candidate = localize(tz, this_week)?;
        if candidate > now {
            let prior = localize(tz, this_week - Duration::days(7))?;
            Ok((prior, candidate))
        } else {
            let next = localize(tz, this_week + Duration::days(7))?;
            Ok((candidate, next))
        }
    }
}

/// A stored absolute schedule time. Legacy rows can hold a
/// timezone-naive value; those are normalized to the study timezone on
/// first read and the corrected value persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredTime {
    Aware(DateTime<Utc>),
    Naive(NaiveDateTime),
}

impl StoredTime {
    pub fn is_naive(&self) -> bool {
        matches!(self, StoredTime::Naive(_))
    }

    /// Resolve to a UTC instant, localizing naive values in `tz`.
    pub fn normalize(self, tz: Tz) -> Result<DateTime<Utc>, ScheduleError> {
        match self {
            StoredTime::Aware(dt) => Ok(dt),
            StoredTime::Naive(naive) => Ok(localize(tz, naive)?.with_timezone(&Utc)),
        }
    }
}

/// A single fixed calendar date and time-of-day.
#[derive(Debug, Clone)]
pub struct AbsoluteSchedule {
    pub id: String,
    pub survey_id: String,
    pub scheduled_time: StoredTime,
}

impl AbsoluteSchedule {
    pub fn new(survey_id: impl Into<String>, scheduled_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            survey_id: survey_id.into(),
            scheduled_time: StoredTime::Aware(scheduled_time),
        }
    }

    /// Construct a legacy-style schedule with a timezone-naive time.
    /// Such rows are healed on first read by the absolute reconciler.
    pub fn new_naive(survey_id: impl Into<String>, scheduled_time: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            survey_id: survey_id.into(),
            scheduled_time: StoredTime::Naive(scheduled_time),
        }
    }
}

/// Intervention-anchored offset rule: fires `days_offset` days from the
/// participant's intervention date, at `time`. The offset is negative
/// or zero for days before or on the intervention date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelativeSchedule {
    pub id: String,
    pub survey_id: String,
    pub intervention_id: String,
    pub days_offset: i64,
    pub time: TimeOfDay,
}

impl RelativeSchedule {
    pub fn new(
        survey_id: impl Into<String>,
        intervention_id: impl Into<String>,
        days_offset: i64,
        time: TimeOfDay,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            survey_id: survey_id.into(),
            intervention_id: intervention_id.into(),
            days_offset,
            time,
        }
    }

    /// Compute the concrete fire instant for one participant's
    /// intervention date, localized to the study timezone.
    pub fn scheduled_time(
        &self,
        intervention_date: NaiveDate,
        tz: Tz,
    ) -> Result<DateTime<Utc>, ScheduleError> {
        let date = intervention_date + Duration::days(self.days_offset);
        let local = date.and_time(self.time.to_naive_time());
        Ok(localize(tz, local)?.with_timezone(&Utc))
    }
}
