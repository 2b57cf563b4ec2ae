//! Domain types for studies, participants, surveys, and interventions.
//!
//! Schedule definitions live in the `schedule` submodule, reconciled
//! event types in `event`.

pub mod event;
pub mod schedule;

pub use event::{ArchivedEvent, DeliveryStatus, ScheduleKind, ScheduleSource, ScheduledEvent};
pub use schedule::{
    localize, AbsoluteSchedule, RelativeSchedule, StoredTime, TimeOfDay, WeeklySchedule,
};

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScheduleError;

/// A longitudinal study. Owns the timezone every scheduled-time
/// computation for its surveys resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub id: String,
    pub name: String,
    /// IANA timezone name, e.g. "America/New_York".
    pub timezone: String,
}

impl Study {
    pub fn new(name: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            timezone: timezone.into(),
        }
    }

    /// Parse the stored IANA timezone name.
    ///
    /// # Errors
    /// Returns `ScheduleError::InvalidTimezone` if the stored name is
    /// not a valid IANA identifier.
    pub fn tz(&self) -> Result<Tz, ScheduleError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ScheduleError::InvalidTimezone {
                study_id: self.id.clone(),
                name: self.timezone.clone(),
            })
    }
}

/// A participant enrolled in a study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub study_id: String,
}

impl Participant {
    pub fn new(study_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            study_id: study_id.into(),
        }
    }
}

/// A survey owned by a study. Soft-deleted surveys keep their rows but
/// must not produce pending events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub id: String,
    pub study_id: String,
    pub name: String,
    pub deleted: bool,
}

impl Survey {
    pub fn new(study_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            study_id: study_id.into(),
            name: name.into(),
            deleted: false,
        }
    }
}

/// A named date anchor recorded per participant (e.g. "surgery",
/// "discharge"). Relative schedules reference one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intervention {
    pub id: String,
    pub study_id: String,
    pub name: String,
}

impl Intervention {
    pub fn new(study_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            study_id: study_id.into(),
            name: name.into(),
        }
    }
}

/// Per-participant calendar date for one intervention. `date` stays
/// unset until clinically recorded; relative schedules skip
/// participants with an unset date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionDate {
    pub participant_id: String,
    pub intervention_id: String,
    pub date: Option<NaiveDate>,
}
