use clap::Subcommand;
use cohort_core::{ReconcileEngine, StudyStore};

#[derive(Subcommand)]
pub enum ReconcileAction {
    /// Rebuild pending events for one survey
    Survey {
        /// Survey ID
        survey_id: String,
        /// Restrict to a single participant
        #[arg(long)]
        participant: Option<String>,
    },
    /// Rebuild pending events for every survey of a study
    Study {
        /// Study ID
        study_id: String,
        /// Restrict to a single participant (after a participant edit)
        #[arg(long)]
        participant: Option<String>,
    },
}

pub fn run(action: ReconcileAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = StudyStore::open()?;
    let engine = ReconcileEngine::new(&store);
    match action {
        ReconcileAction::Survey {
            survey_id,
            participant,
        } => {
            let outcome = engine.reconcile_survey(&survey_id, participant.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        ReconcileAction::Study {
            study_id,
            participant,
        } => {
            let outcome = engine.reconcile_study(&study_id, participant.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.failures.is_empty() {
                std::process::exit(2);
            }
        }
    }
    Ok(())
}
