use clap::Subcommand;
use cohort_core::{Config, Study, StudyStore};

#[derive(Subcommand)]
pub enum StudyAction {
    /// Create a new study
    Create {
        /// Study name
        name: String,
        /// IANA timezone (defaults to the configured default)
        #[arg(long)]
        timezone: Option<String>,
    },
    /// List all studies
    List,
}

pub fn run(action: StudyAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = StudyStore::open()?;
    match action {
        StudyAction::Create { name, timezone } => {
            let timezone =
                timezone.unwrap_or_else(|| Config::load_or_default().default_timezone);
            let study = Study::new(name, timezone);
            // Reject bad timezone names at creation time, not at the
            // first reconcile.
            study.tz()?;
            store.create_study(&study)?;
            println!("{}", serde_json::to_string_pretty(&study)?);
        }
        StudyAction::List => {
            let studies = store.list_studies()?;
            println!("{}", serde_json::to_string_pretty(&studies)?);
        }
    }
    Ok(())
}
