use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cohort-cli", version, about = "Cohort schedule reconciliation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Study management
    Study {
        #[command(subcommand)]
        action: commands::study::StudyAction,
    },
    /// Participant enrollment
    Participant {
        #[command(subcommand)]
        action: commands::participant::ParticipantAction,
    },
    /// Survey management
    Survey {
        #[command(subcommand)]
        action: commands::survey::SurveyAction,
    },
    /// Schedule definitions
    Schedule {
        #[command(subcommand)]
        action: commands::schedule::ScheduleAction,
    },
    /// Intervention anchors and per-participant dates
    Intervention {
        #[command(subcommand)]
        action: commands::intervention::InterventionAction,
    },
    /// Rebuild pending events from schedule definitions
    Reconcile {
        #[command(subcommand)]
        action: commands::reconcile::ReconcileAction,
    },
    /// Inspect pending events
    Pending {
        #[command(subcommand)]
        action: commands::pending::PendingAction,
    },
    /// Delivery archive
    Archive {
        #[command(subcommand)]
        action: commands::archive::ArchiveAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Study { action } => commands::study::run(action),
        Commands::Participant { action } => commands::participant::run(action),
        Commands::Survey { action } => commands::survey::run(action),
        Commands::Schedule { action } => commands::schedule::run(action),
        Commands::Intervention { action } => commands::intervention::run(action),
        Commands::Reconcile { action } => commands::reconcile::run(action),
        Commands::Pending { action } => commands::pending::run(action),
        Commands::Archive { action } => commands::archive::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
