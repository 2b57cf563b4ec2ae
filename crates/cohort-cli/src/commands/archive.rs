use chrono::{DateTime, Utc};
use clap::Subcommand;
use cohort_core::{ArchivedEvent, DeliveryStatus, StudyStore};

#[derive(Subcommand)]
pub enum ArchiveAction {
    /// List archived delivery attempts for a survey
    List {
        /// Survey ID
        survey_id: String,
    },
    /// Record a delivery attempt directly (stands in for the delivery
    /// subsystem when testing dedup behavior)
    Record {
        /// Participant ID
        participant_id: String,
        /// Survey ID
        survey_id: String,
        /// Scheduled time the attempt corresponds to, RFC 3339
        scheduled_time: String,
        /// Record the attempt as failed instead of successful
        #[arg(long)]
        failed: bool,
    },
    /// Mark a pending event as delivered: remove it from the pending
    /// table and record the attempt in the archive
    Claim {
        /// Pending event ID
        event_id: String,
        /// Record the attempt as failed instead of successful
        #[arg(long)]
        failed: bool,
    },
}

pub fn run(action: ArchiveAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = StudyStore::open()?;
    match action {
        ArchiveAction::List { survey_id } => {
            let events = store.list_archived(&survey_id)?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        ArchiveAction::Record {
            participant_id,
            survey_id,
            scheduled_time,
            failed,
        } => {
            let when: DateTime<Utc> = DateTime::parse_from_rfc3339(&scheduled_time)
                .map_err(|_| format!("invalid RFC 3339 datetime: {scheduled_time}"))?
                .with_timezone(&Utc);
            let status = if failed {
                DeliveryStatus::Failed
            } else {
                DeliveryStatus::Success
            };
            let archived = ArchivedEvent::new(participant_id, survey_id, when, status);
            store.record_archived_event(&archived)?;
            println!("{}", serde_json::to_string_pretty(&archived)?);
        }
        ArchiveAction::Claim { event_id, failed } => {
            let status = if failed {
                DeliveryStatus::Failed
            } else {
                DeliveryStatus::Success
            };
            match store.claim_pending(&event_id, status)? {
                Some(archived) => println!("{}", serde_json::to_string_pretty(&archived)?),
                None => return Err(format!("no pending event with id {event_id}").into()),
            }
        }
    }
    Ok(())
}
