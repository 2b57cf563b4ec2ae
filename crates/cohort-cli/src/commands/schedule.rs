use chrono::{DateTime, Utc};
use clap::Subcommand;
use cohort_core::{AbsoluteSchedule, RelativeSchedule, StudyStore, WeeklySchedule};
use serde_json::json;

use super::{parse_time_of_day, parse_weekday};

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Add a weekly recurrence rule to a survey
    AddWeekly {
        /// Survey ID
        survey_id: String,
        /// Day of week (e.g. monday)
        day: String,
        /// Wall-clock time, HH:MM
        time: String,
        /// Definition order within the survey
        #[arg(long, default_value_t = 0)]
        position: i64,
    },
    /// Add a fixed-instant schedule to a survey
    AddAbsolute {
        /// Survey ID
        survey_id: String,
        /// RFC 3339 datetime (e.g. 2024-06-10T09:00:00Z)
        datetime: String,
    },
    /// Add an intervention-relative schedule to a survey
    AddRelative {
        /// Survey ID
        survey_id: String,
        /// Intervention ID
        intervention_id: String,
        /// Signed day offset from the intervention date
        days_offset: i64,
        /// Wall-clock time, HH:MM
        time: String,
    },
    /// List all schedule definitions of a survey
    List {
        /// Survey ID
        survey_id: String,
    },
}

pub fn run(action: ScheduleAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = StudyStore::open()?;
    match action {
        ScheduleAction::AddWeekly {
            survey_id,
            day,
            time,
            position,
        } => {
            let schedule = WeeklySchedule::new(
                survey_id,
                parse_weekday(&day)?,
                parse_time_of_day(&time)?,
                position,
            );
            store.create_weekly_schedule(&schedule)?;
            println!("{}", serde_json::to_string_pretty(&schedule)?);
        }
        ScheduleAction::AddAbsolute {
            survey_id,
            datetime,
        } => {
            let when: DateTime<Utc> = DateTime::parse_from_rfc3339(&datetime)
                .map_err(|_| format!("invalid RFC 3339 datetime: {datetime}"))?
                .with_timezone(&Utc);
            let schedule = AbsoluteSchedule::new(survey_id, when);
            store.create_absolute_schedule(&schedule)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "id": schedule.id,
                    "survey_id": schedule.survey_id,
                    "scheduled_time": when.to_rfc3339(),
                }))?
            );
        }
        ScheduleAction::AddRelative {
            survey_id,
            intervention_id,
            days_offset,
            time,
        } => {
            let schedule = RelativeSchedule::new(
                survey_id,
                intervention_id,
                days_offset,
                parse_time_of_day(&time)?,
            );
            store.create_relative_schedule(&schedule)?;
            println!("{}", serde_json::to_string_pretty(&schedule)?);
        }
        ScheduleAction::List { survey_id } => {
            let weekly = store.weekly_schedules_of_survey(&survey_id)?;
            let absolute: Vec<serde_json::Value> = store
                .absolute_schedules_of_survey(&survey_id)?
                .iter()
                .map(|s| {
                    json!({
                        "id": s.id,
                        "survey_id": s.survey_id,
                        "naive": s.scheduled_time.is_naive(),
                    })
                })
                .collect();
            let relative = store.relative_schedules_of_survey(&survey_id)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "weekly": weekly,
                    "absolute": absolute,
                    "relative": relative,
                }))?
            );
        }
    }
    Ok(())
}
