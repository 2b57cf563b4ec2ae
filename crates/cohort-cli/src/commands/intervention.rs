use chrono::NaiveDate;
use clap::Subcommand;
use cohort_core::{Intervention, StudyStore};

#[derive(Subcommand)]
pub enum InterventionAction {
    /// Create a named intervention anchor for a study
    Create {
        /// Study ID
        study_id: String,
        /// Intervention name (e.g. "surgery")
        name: String,
    },
    /// List interventions of a study
    List {
        /// Study ID
        study_id: String,
    },
    /// Record a participant's intervention date
    SetDate {
        /// Participant ID
        participant_id: String,
        /// Intervention ID
        intervention_id: String,
        /// Calendar date, YYYY-MM-DD (omit with --clear to unset)
        date: Option<String>,
        /// Clear the recorded date
        #[arg(long, conflicts_with = "date")]
        clear: bool,
    },
}

pub fn run(action: InterventionAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = StudyStore::open()?;
    match action {
        InterventionAction::Create { study_id, name } => {
            let intervention = Intervention::new(study_id, name);
            store.create_intervention(&intervention)?;
            println!("{}", serde_json::to_string_pretty(&intervention)?);
        }
        InterventionAction::List { study_id } => {
            let interventions = store.interventions_of_study(&study_id)?;
            println!("{}", serde_json::to_string_pretty(&interventions)?);
        }
        InterventionAction::SetDate {
            participant_id,
            intervention_id,
            date,
            clear,
        } => {
            let date = match (date, clear) {
                (Some(raw), false) => Some(
                    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                        .map_err(|_| format!("invalid date: {raw} (expected YYYY-MM-DD)"))?,
                ),
                (None, true) => None,
                _ => return Err("provide a date or --clear".into()),
            };
            store.set_intervention_date(&participant_id, &intervention_id, date)?;
            match date {
                Some(d) => println!("date set to {d}"),
                None => println!("date cleared"),
            }
        }
    }
    Ok(())
}
