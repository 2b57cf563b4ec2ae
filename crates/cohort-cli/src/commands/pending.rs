use clap::Subcommand;
use cohort_core::StudyStore;

use super::parse_kind;

#[derive(Subcommand)]
pub enum PendingAction {
    /// List pending events of a survey
    List {
        /// Survey ID
        survey_id: String,
        /// Restrict to a single participant
        #[arg(long)]
        participant: Option<String>,
        /// Restrict to one schedule kind (weekly, absolute, relative)
        #[arg(long)]
        kind: Option<String>,
    },
}

pub fn run(action: PendingAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = StudyStore::open()?;
    match action {
        PendingAction::List {
            survey_id,
            participant,
            kind,
        } => {
            let kind = kind.as_deref().map(parse_kind).transpose()?;
            let events = store.list_pending(&survey_id, participant.as_deref(), kind)?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
    }
    Ok(())
}
