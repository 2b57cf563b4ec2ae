use clap::Subcommand;
use cohort_core::{StudyStore, Survey};

#[derive(Subcommand)]
pub enum SurveyAction {
    /// Create a new survey
    Create {
        /// Study ID
        study_id: String,
        /// Survey name
        name: String,
    },
    /// List surveys of a study (soft-deleted ones included)
    List {
        /// Study ID
        study_id: String,
    },
    /// Soft-delete a survey; its pending events are purged on the next
    /// reconcile
    Delete {
        /// Survey ID
        survey_id: String,
    },
    /// Restore a soft-deleted survey
    Restore {
        /// Survey ID
        survey_id: String,
    },
}

pub fn run(action: SurveyAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = StudyStore::open()?;
    match action {
        SurveyAction::Create { study_id, name } => {
            let survey = Survey::new(study_id, name);
            store.create_survey(&survey)?;
            println!("{}", serde_json::to_string_pretty(&survey)?);
        }
        SurveyAction::List { study_id } => {
            let surveys = store.surveys_of_study(&study_id)?;
            println!("{}", serde_json::to_string_pretty(&surveys)?);
        }
        SurveyAction::Delete { survey_id } => {
            store.set_survey_deleted(&survey_id, true)?;
            println!("survey {survey_id} deleted");
        }
        SurveyAction::Restore { survey_id } => {
            store.set_survey_deleted(&survey_id, false)?;
            println!("survey {survey_id} restored");
        }
    }
    Ok(())
}
