use clap::Subcommand;
use cohort_core::{Participant, StudyStore};

#[derive(Subcommand)]
pub enum ParticipantAction {
    /// Enroll a new participant in a study
    Add {
        /// Study ID
        study_id: String,
    },
    /// List participants of a study
    List {
        /// Study ID
        study_id: String,
    },
}

pub fn run(action: ParticipantAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = StudyStore::open()?;
    match action {
        ParticipantAction::Add { study_id } => {
            let participant = Participant::new(study_id);
            store.create_participant(&participant)?;
            println!("{}", serde_json::to_string_pretty(&participant)?);
        }
        ParticipantAction::List { study_id } => {
            let participants = store.participants_of_study(&study_id)?;
            println!("{}", serde_json::to_string_pretty(&participants)?);
        }
    }
    Ok(())
}
