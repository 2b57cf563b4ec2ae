//! Reconciled event types: pending scheduled events and the archive of
//! delivery attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminator for which schedule kind produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    Weekly,
    Absolute,
    Relative,
}

/// The schedule definition a pending event was derived from. Exactly
/// one of the three kinds, enforced structurally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScheduleSource {
    Weekly { schedule_id: String },
    Absolute { schedule_id: String },
    Relative { schedule_id: String },
}

impl ScheduleSource {
    pub fn kind(&self) -> ScheduleKind {
        match self {
            ScheduleSource::Weekly { .. } => ScheduleKind::Weekly,
            ScheduleSource::Absolute { .. } => ScheduleKind::Absolute,
            ScheduleSource::Relative { .. } => ScheduleKind::Relative,
        }
    }

    pub fn schedule_id(&self) -> &str {
        match self {
            ScheduleSource::Weekly { schedule_id }
            | ScheduleSource::Absolute { schedule_id }
            | ScheduleSource::Relative { schedule_id } => schedule_id,
        }
    }
}

/// A computed, not-yet-delivered notification instance. Created and
/// destroyed exclusively by the reconciliation engine; the delivery
/// subsystem only reads these and, on firing, claims them into the
/// archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub id: String,
    pub survey_id: String,
    pub participant_id: String,
    pub source: ScheduleSource,
    pub scheduled_time: DateTime<Utc>,
}

impl ScheduledEvent {
    pub fn new(
        survey_id: impl Into<String>,
        participant_id: impl Into<String>,
        source: ScheduleSource,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            survey_id: survey_id.into(),
            participant_id: participant_id.into(),
            source,
            scheduled_time,
        }
    }
}

/// Outcome of a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Failed,
}

/// Immutable record of a delivery attempt. The reconcilers use these
/// purely as a negative-lookup key: a matching (participant, survey,
/// scheduled_time) means the notification already fired and must not
/// be re-offered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedEvent {
    pub id: String,
    pub participant_id: String,
    pub survey_id: String,
    pub scheduled_time: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
}

impl ArchivedEvent {
    pub fn new(
        participant_id: impl Into<String>,
        survey_id: impl Into<String>,
        scheduled_time: DateTime<Utc>,
        status: DeliveryStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            participant_id: participant_id.into(),
            survey_id: survey_id.into(),
            scheduled_time,
            status,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_and_schedule_id() {
        let src = ScheduleSource::Relative {
            schedule_id: "rs-1".into(),
        };
        assert_eq!(src.kind(), ScheduleKind::Relative);
        assert_eq!(src.schedule_id(), "rs-1");
    }

    #[test]
    fn scheduled_event_serialization() {
        let event = ScheduledEvent::new(
            "survey-1",
            "participant-1",
            ScheduleSource::Weekly {
                schedule_id: "ws-1".into(),
            },
            Utc::now(),
        );
        let json = serde_json::to_string(&event).unwrap();
        let decoded: ScheduledEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.source.kind(), ScheduleKind::Weekly);
    }
}
