//! SQLite-based storage for studies, schedule definitions, pending
//! events, and the delivery archive.
//!
//! All timezone-aware timestamps are persisted as UTC RFC 3339 strings;
//! archive lookups compare on that canonical form. Legacy absolute
//! schedule rows may hold a naive local time with no offset -- the
//! reconciler normalizes those on first read.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc, Weekday};
use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, migrations};
use crate::error::{CoreError, DatabaseError};
use crate::model::{
    AbsoluteSchedule, ArchivedEvent, DeliveryStatus, Intervention, Participant, RelativeSchedule,
    ScheduleKind, ScheduleSource, ScheduledEvent, StoredTime, Study, Survey, TimeOfDay,
    WeeklySchedule,
};

// === Helper Functions ===

/// Format schedule kind for database storage
fn format_kind(kind: ScheduleKind) -> &'static str {
    match kind {
        ScheduleKind::Weekly => "weekly",
        ScheduleKind::Absolute => "absolute",
        ScheduleKind::Relative => "relative",
    }
}

/// Parse schedule kind from database string
fn parse_kind(kind_str: &str) -> ScheduleKind {
    match kind_str {
        "absolute" => ScheduleKind::Absolute,
        "relative" => ScheduleKind::Relative,
        _ => ScheduleKind::Weekly,
    }
}

/// Format delivery status for database storage
fn format_status(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Success => "success",
        DeliveryStatus::Failed => "failed",
    }
}

/// Parse delivery status from database string
fn parse_status(status_str: &str) -> DeliveryStatus {
    match status_str {
        "success" => DeliveryStatus::Success,
        _ => DeliveryStatus::Failed,
    }
}

/// Weekday stored as days-from-Sunday (0 = Sunday .. 6 = Saturday).
fn format_weekday(day: Weekday) -> i64 {
    day.num_days_from_sunday() as i64
}

fn parse_weekday(n: i64) -> Weekday {
    match n {
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        6 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a stored absolute schedule time: RFC 3339 if the row was
/// written (or healed) with an offset, otherwise a legacy naive value.
fn parse_stored_time(raw: &str) -> Result<StoredTime, rusqlite::Error> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(StoredTime::Aware(dt.with_timezone(&Utc)));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(StoredTime::Naive(naive));
        }
    }
    Err(rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("unparseable schedule time: {raw}").into(),
    ))
}

fn format_stored_time(time: &StoredTime) -> String {
    match time {
        StoredTime::Aware(dt) => dt.to_rfc3339(),
        StoredTime::Naive(naive) => naive.format("%Y-%m-%dT%H:%M:%S").to_string(),
    }
}

/// Build a ScheduledEvent from a database row
/// (id, survey_id, participant_id, schedule_kind, schedule_id, scheduled_time).
fn row_to_scheduled_event(row: &rusqlite::Row) -> Result<ScheduledEvent, rusqlite::Error> {
    let kind_str: String = row.get(3)?;
    let schedule_id: String = row.get(4)?;
    let source = match parse_kind(&kind_str) {
        ScheduleKind::Weekly => ScheduleSource::Weekly { schedule_id },
        ScheduleKind::Absolute => ScheduleSource::Absolute { schedule_id },
        ScheduleKind::Relative => ScheduleSource::Relative { schedule_id },
    };
    let time_str: String = row.get(5)?;

    Ok(ScheduledEvent {
        id: row.get(0)?,
        survey_id: row.get(1)?,
        participant_id: row.get(2)?,
        source,
        scheduled_time: parse_datetime_fallback(&time_str),
    })
}

fn row_to_archived_event(row: &rusqlite::Row) -> Result<ArchivedEvent, rusqlite::Error> {
    let time_str: String = row.get(3)?;
    let status_str: String = row.get(4)?;
    let created_str: String = row.get(5)?;
    Ok(ArchivedEvent {
        id: row.get(0)?,
        participant_id: row.get(1)?,
        survey_id: row.get(2)?,
        scheduled_time: parse_datetime_fallback(&time_str),
        status: parse_status(&status_str),
        created_at: parse_datetime_fallback(&created_str),
    })
}

/// SQLite database for study and schedule storage.
///
/// Owns the pending event table; the archive is written through the
/// delivery hand-off (`claim_pending`) and read-only to the reconcilers.
pub struct StudyStore {
    conn: Connection,
}

impl StudyStore {
    /// Open the store at `~/.config/cohort/cohort.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("cohort.db");
        let conn = Connection::open(&path).map_err(|source| DatabaseError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory store (for tests and dry runs).
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        // Base tables (v1 schema) first
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS studies (
                    id       TEXT PRIMARY KEY,
                    name     TEXT NOT NULL,
                    timezone TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS participants (
                    id       TEXT PRIMARY KEY,
                    study_id TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS surveys (
                    id       TEXT PRIMARY KEY,
                    study_id TEXT NOT NULL,
                    name     TEXT NOT NULL,
                    deleted  INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS weekly_schedules (
                    id          TEXT PRIMARY KEY,
                    survey_id   TEXT NOT NULL,
                    day_of_week INTEGER NOT NULL,
                    hour        INTEGER NOT NULL,
                    minute      INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS absolute_schedules (
                    id             TEXT PRIMARY KEY,
                    survey_id      TEXT NOT NULL,
                    scheduled_time TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS relative_schedules (
                    id              TEXT PRIMARY KEY,
                    survey_id       TEXT NOT NULL,
                    intervention_id TEXT NOT NULL,
                    days_offset     INTEGER NOT NULL,
                    hour            INTEGER NOT NULL,
                    minute          INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS interventions (
                    id       TEXT PRIMARY KEY,
                    study_id TEXT NOT NULL,
                    name     TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS intervention_dates (
                    participant_id  TEXT NOT NULL,
                    intervention_id TEXT NOT NULL,
                    date            TEXT,
                    PRIMARY KEY (participant_id, intervention_id)
                );

                CREATE TABLE IF NOT EXISTS scheduled_events (
                    id             TEXT PRIMARY KEY,
                    survey_id      TEXT NOT NULL,
                    participant_id TEXT NOT NULL,
                    schedule_kind  TEXT NOT NULL,
                    schedule_id    TEXT NOT NULL,
                    scheduled_time TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS archived_events (
                    id             TEXT PRIMARY KEY,
                    participant_id TEXT NOT NULL,
                    survey_id      TEXT NOT NULL,
                    scheduled_time TEXT NOT NULL,
                    status         TEXT NOT NULL,
                    created_at     TEXT NOT NULL
                );",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        // Run incremental migrations (v1 -> v2, etc.)
        migrations::migrate(&self.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        // Pending-table uniqueness invariant and archive lookup index
        // (idempotent, runs after migrations add the columns).
        self.conn
            .execute_batch(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_scheduled_events_unique
                 ON scheduled_events(survey_id, participant_id, schedule_kind, scheduled_time);

                 CREATE INDEX IF NOT EXISTS idx_archived_events_lookup
                 ON archived_events(survey_id, scheduled_time, participant_id);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        Ok(())
    }

    // === Study CRUD ===

    pub fn create_study(&self, study: &Study) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO studies (id, name, timezone) VALUES (?1, ?2, ?3)",
            params![study.id, study.name, study.timezone],
        )?;
        Ok(())
    }

    pub fn get_study(&self, id: &str) -> Result<Option<Study>, DatabaseError> {
        let study = self
            .conn
            .query_row(
                "SELECT id, name, timezone FROM studies WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Study {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        timezone: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(study)
    }

    pub fn list_studies(&self) -> Result<Vec<Study>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, timezone FROM studies ORDER BY rowid ASC")?;
        let studies = stmt
            .query_map([], |row| {
                Ok(Study {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    timezone: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(studies)
    }

    /// Look up the study owning a survey.
    pub fn study_of_survey(&self, survey_id: &str) -> Result<Study, DatabaseError> {
        let survey = self
            .get_survey(survey_id)?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "survey",
                id: survey_id.to_string(),
            })?;
        self.get_study(&survey.study_id)?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "study",
                id: survey.study_id,
            })
    }

    // === Participant CRUD ===

    pub fn create_participant(&self, participant: &Participant) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO participants (id, study_id) VALUES (?1, ?2)",
            params![participant.id, participant.study_id],
        )?;
        Ok(())
    }

    pub fn participants_of_study(&self, study_id: &str) -> Result<Vec<Participant>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, study_id FROM participants WHERE study_id = ?1 ORDER BY rowid ASC",
        )?;
        let participants = stmt
            .query_map(params![study_id], |row| {
                Ok(Participant {
                    id: row.get(0)?,
                    study_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(participants)
    }

    // === Survey CRUD ===

    pub fn create_survey(&self, survey: &Survey) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO surveys (id, study_id, name, deleted) VALUES (?1, ?2, ?3, ?4)",
            params![
                survey.id,
                survey.study_id,
                survey.name,
                survey.deleted as i64
            ],
        )?;
        Ok(())
    }

    pub fn get_survey(&self, id: &str) -> Result<Option<Survey>, DatabaseError> {
        let survey = self
            .conn
            .query_row(
                "SELECT id, study_id, name, deleted FROM surveys WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Survey {
                        id: row.get(0)?,
                        study_id: row.get(1)?,
                        name: row.get(2)?,
                        deleted: row.get::<_, i64>(3)? != 0,
                    })
                },
            )
            .optional()?;
        Ok(survey)
    }

    pub fn surveys_of_study(&self, study_id: &str) -> Result<Vec<Survey>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, study_id, name, deleted FROM surveys WHERE study_id = ?1 ORDER BY rowid ASC",
        )?;
        let surveys = stmt
            .query_map(params![study_id], |row| {
                Ok(Survey {
                    id: row.get(0)?,
                    study_id: row.get(1)?,
                    name: row.get(2)?,
                    deleted: row.get::<_, i64>(3)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(surveys)
    }

    /// Soft-delete (or restore) a survey.
    pub fn set_survey_deleted(&self, id: &str, deleted: bool) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE surveys SET deleted = ?1 WHERE id = ?2",
            params![deleted as i64, id],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "survey",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    // === Schedule definitions ===

    pub fn create_weekly_schedule(&self, schedule: &WeeklySchedule) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO weekly_schedules (id, survey_id, day_of_week, hour, minute, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                schedule.id,
                schedule.survey_id,
                format_weekday(schedule.day_of_week),
                schedule.time.hour,
                schedule.time.minute,
                schedule.position,
            ],
        )?;
        Ok(())
    }

    /// Weekly schedules of a survey in definition order.
    pub fn weekly_schedules_of_survey(
        &self,
        survey_id: &str,
    ) -> Result<Vec<WeeklySchedule>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, survey_id, day_of_week, hour, minute, position
             FROM weekly_schedules
             WHERE survey_id = ?1
             ORDER BY position ASC, rowid ASC",
        )?;
        let schedules = stmt
            .query_map(params![survey_id], |row| {
                Ok(WeeklySchedule {
                    id: row.get(0)?,
                    survey_id: row.get(1)?,
                    day_of_week: parse_weekday(row.get(2)?),
                    time: TimeOfDay::new(row.get(3)?, row.get(4)?),
                    position: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(schedules)
    }

    pub fn create_absolute_schedule(
        &self,
        schedule: &AbsoluteSchedule,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO absolute_schedules (id, survey_id, scheduled_time) VALUES (?1, ?2, ?3)",
            params![
                schedule.id,
                schedule.survey_id,
                format_stored_time(&schedule.scheduled_time),
            ],
        )?;
        Ok(())
    }

    pub fn absolute_schedules_of_survey(
        &self,
        survey_id: &str,
    ) -> Result<Vec<AbsoluteSchedule>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, survey_id, scheduled_time
             FROM absolute_schedules
             WHERE survey_id = ?1
             ORDER BY rowid ASC",
        )?;
        let schedules = stmt
            .query_map(params![survey_id], |row| {
                let raw: String = row.get(2)?;
                Ok(AbsoluteSchedule {
                    id: row.get(0)?,
                    survey_id: row.get(1)?,
                    scheduled_time: parse_stored_time(&raw)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(schedules)
    }

    /// Persist a normalized time for a legacy naive absolute schedule.
    pub fn update_absolute_schedule_time(
        &self,
        id: &str,
        scheduled_time: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            "UPDATE absolute_schedules SET scheduled_time = ?1 WHERE id = ?2",
            params![scheduled_time.to_rfc3339(), id],
        )?;
        Ok(())
    }

    pub fn create_relative_schedule(
        &self,
        schedule: &RelativeSchedule,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO relative_schedules (id, survey_id, intervention_id, days_offset, hour, minute)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                schedule.id,
                schedule.survey_id,
                schedule.intervention_id,
                schedule.days_offset,
                schedule.time.hour,
                schedule.time.minute,
            ],
        )?;
        Ok(())
    }

    pub fn relative_schedules_of_survey(
        &self,
        survey_id: &str,
    ) -> Result<Vec<RelativeSchedule>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, survey_id, intervention_id, days_offset, hour, minute
             FROM relative_schedules
             WHERE survey_id = ?1
             ORDER BY rowid ASC",
        )?;
        let schedules = stmt
            .query_map(params![survey_id], |row| {
                Ok(RelativeSchedule {
                    id: row.get(0)?,
                    survey_id: row.get(1)?,
                    intervention_id: row.get(2)?,
                    days_offset: row.get(3)?,
                    time: TimeOfDay::new(row.get(4)?, row.get(5)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(schedules)
    }

    // === Interventions ===

    pub fn create_intervention(&self, intervention: &Intervention) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO interventions (id, study_id, name) VALUES (?1, ?2, ?3)",
            params![intervention.id, intervention.study_id, intervention.name],
        )?;
        Ok(())
    }

    pub fn interventions_of_study(
        &self,
        study_id: &str,
    ) -> Result<Vec<Intervention>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, study_id, name FROM interventions WHERE study_id = ?1 ORDER BY rowid ASC",
        )?;
        let interventions = stmt
            .query_map(params![study_id], |row| {
                Ok(Intervention {
                    id: row.get(0)?,
                    study_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(interventions)
    }

    /// Record (or clear) a participant's date for an intervention.
    pub fn set_intervention_date(
        &self,
        participant_id: &str,
        intervention_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO intervention_dates (participant_id, intervention_id, date)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (participant_id, intervention_id) DO UPDATE SET date = excluded.date",
            params![
                participant_id,
                intervention_id,
                date.map(|d| d.format("%Y-%m-%d").to_string()),
            ],
        )?;
        Ok(())
    }

    /// Participants with a *set* date for an intervention, optionally
    /// restricted to one participant. Unset dates are never returned.
    pub fn intervention_dates_for(
        &self,
        intervention_id: &str,
        participant: Option<&str>,
    ) -> Result<Vec<(String, NaiveDate)>, DatabaseError> {
        let mut query = String::from(
            "SELECT participant_id, date FROM intervention_dates
             WHERE intervention_id = ?1 AND date IS NOT NULL",
        );
        if participant.is_some() {
            query.push_str(" AND participant_id = ?2");
        }
        query.push_str(" ORDER BY rowid ASC");

        let mut stmt = self.conn.prepare(&query)?;
        let map_row = |row: &rusqlite::Row| -> Result<(String, NaiveDate), rusqlite::Error> {
            let participant_id: String = row.get(0)?;
            let raw: String = row.get(1)?;
            let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            Ok((participant_id, date))
        };

        let dates = if let Some(participant_id) = participant {
            stmt.query_map(params![intervention_id, participant_id], map_row)?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(params![intervention_id], map_row)?
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(dates)
    }

    // === Pending events ===

    /// Pending events for a survey, optionally scoped to one
    /// participant and/or one schedule kind.
    pub fn list_pending(
        &self,
        survey_id: &str,
        participant: Option<&str>,
        kind: Option<ScheduleKind>,
    ) -> Result<Vec<ScheduledEvent>, DatabaseError> {
        let (query, bindings) = Self::pending_filter(
            "SELECT id, survey_id, participant_id, schedule_kind, schedule_id, scheduled_time
             FROM scheduled_events",
            survey_id,
            participant,
            kind,
        );
        let mut stmt = self.conn.prepare(&format!(
            "{query} ORDER BY scheduled_time ASC, rowid ASC"
        ))?;
        let events = stmt
            .query_map(rusqlite::params_from_iter(bindings), row_to_scheduled_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Rewrite a slice of the pending table: delete everything in scope
    /// and bulk-insert the replacement set, in a single transaction so
    /// a failed insert never leaves the scope empty.
    ///
    /// Returns the number of events created.
    pub fn replace_pending(
        &self,
        survey_id: &str,
        participant: Option<&str>,
        kind: Option<ScheduleKind>,
        events: &[ScheduledEvent],
    ) -> Result<usize, DatabaseError> {
        let (delete_query, bindings) =
            Self::pending_filter("DELETE FROM scheduled_events", survey_id, participant, kind);

        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        let result: Result<(), rusqlite::Error> = (|| {
            self.conn
                .execute(&delete_query, rusqlite::params_from_iter(bindings))?;
            for event in events {
                self.conn.execute(
                    "INSERT INTO scheduled_events
                     (id, survey_id, participant_id, schedule_kind, schedule_id, scheduled_time)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        event.id,
                        event.survey_id,
                        event.participant_id,
                        format_kind(event.source.kind()),
                        event.source.schedule_id(),
                        event.scheduled_time.to_rfc3339(),
                    ],
                )?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                self.conn.execute_batch("COMMIT;")?;
                Ok(events.len())
            }
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err.into())
            }
        }
    }

    fn pending_filter(
        prefix: &str,
        survey_id: &str,
        participant: Option<&str>,
        kind: Option<ScheduleKind>,
    ) -> (String, Vec<String>) {
        let mut query = format!("{prefix} WHERE survey_id = ?1");
        let mut bindings = vec![survey_id.to_string()];
        if let Some(participant_id) = participant {
            bindings.push(participant_id.to_string());
            query.push_str(&format!(" AND participant_id = ?{}", bindings.len()));
        }
        if let Some(kind) = kind {
            bindings.push(format_kind(kind).to_string());
            query.push_str(&format!(" AND schedule_kind = ?{}", bindings.len()));
        }
        (query, bindings)
    }

    /// Delivery hand-off: atomically remove a pending event and write
    /// the corresponding archive record. Returns the archived record,
    /// or None if the event id is not pending (already claimed).
    pub fn claim_pending(
        &self,
        event_id: &str,
        status: DeliveryStatus,
    ) -> Result<Option<ArchivedEvent>, DatabaseError> {
        let event = self
            .conn
            .query_row(
                "SELECT id, survey_id, participant_id, schedule_kind, schedule_id, scheduled_time
                 FROM scheduled_events WHERE id = ?1",
                params![event_id],
                row_to_scheduled_event,
            )
            .optional()?;
        let Some(event) = event else {
            return Ok(None);
        };

        let archived = ArchivedEvent::new(
            event.participant_id.clone(),
            event.survey_id.clone(),
            event.scheduled_time,
            status,
        );

        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        let result: Result<(), rusqlite::Error> = (|| {
            self.conn.execute(
                "DELETE FROM scheduled_events WHERE id = ?1",
                params![event_id],
            )?;
            self.conn.execute(
                "INSERT INTO archived_events
                 (id, participant_id, survey_id, scheduled_time, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    archived.id,
                    archived.participant_id,
                    archived.survey_id,
                    archived.scheduled_time.to_rfc3339(),
                    format_status(archived.status),
                    archived.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                self.conn.execute_batch("COMMIT;")?;
                Ok(Some(archived))
            }
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err.into())
            }
        }
    }

    // === Archive ===

    /// Record a delivery attempt directly (delivery-subsystem write
    /// path; the engine itself never calls this).
    pub fn record_archived_event(&self, archived: &ArchivedEvent) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO archived_events
             (id, participant_id, survey_id, scheduled_time, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                archived.id,
                archived.participant_id,
                archived.survey_id,
                archived.scheduled_time.to_rfc3339(),
                format_status(archived.status),
                archived.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Has a delivery attempt already been recorded for this exact
    /// (participant, survey, scheduled_time)?
    pub fn archived_exists(
        &self,
        participant_id: &str,
        survey_id: &str,
        scheduled_time: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM archived_events
             WHERE participant_id = ?1 AND survey_id = ?2 AND scheduled_time = ?3",
            params![participant_id, survey_id, scheduled_time.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Participants with any archived attempt for this survey at this
    /// exact instant (bulk negative lookup for the absolute reconciler).
    pub fn archived_participants_at(
        &self,
        survey_id: &str,
        scheduled_time: DateTime<Utc>,
    ) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT participant_id FROM archived_events
             WHERE survey_id = ?1 AND scheduled_time = ?2",
        )?;
        let participants = stmt
            .query_map(params![survey_id, scheduled_time.to_rfc3339()], |row| {
                row.get(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(participants)
    }

    pub fn list_archived(&self, survey_id: &str) -> Result<Vec<ArchivedEvent>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, participant_id, survey_id, scheduled_time, status, created_at
             FROM archived_events
             WHERE survey_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let events = stmt
            .query_map(params![survey_id], row_to_archived_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store_with_study() -> (StudyStore, Study) {
        let store = StudyStore::open_memory().unwrap();
        let study = Study::new("Test study", "UTC");
        store.create_study(&study).unwrap();
        (store, study)
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn create_and_get_study() {
        let (store, study) = store_with_study();
        let retrieved = store.get_study(&study.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Test study");
        assert_eq!(retrieved.timezone, "UTC");
    }

    #[test]
    fn survey_soft_delete_round_trip() {
        let (store, study) = store_with_study();
        let survey = Survey::new(&study.id, "Weekly check-in");
        store.create_survey(&survey).unwrap();

        store.set_survey_deleted(&survey.id, true).unwrap();
        assert!(store.get_survey(&survey.id).unwrap().unwrap().deleted);

        store.set_survey_deleted(&survey.id, false).unwrap();
        assert!(!store.get_survey(&survey.id).unwrap().unwrap().deleted);
    }

    #[test]
    fn set_survey_deleted_unknown_id_is_not_found() {
        let (store, _study) = store_with_study();
        let err = store.set_survey_deleted("nope", true).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn weekly_schedules_come_back_in_definition_order() {
        let (store, study) = store_with_study();
        let survey = Survey::new(&study.id, "s");
        store.create_survey(&survey).unwrap();

        let second = WeeklySchedule::new(&survey.id, Weekday::Wed, TimeOfDay::new(9, 0), 1);
        let first = WeeklySchedule::new(&survey.id, Weekday::Mon, TimeOfDay::new(9, 0), 0);
        store.create_weekly_schedule(&second).unwrap();
        store.create_weekly_schedule(&first).unwrap();

        let schedules = store.weekly_schedules_of_survey(&survey.id).unwrap();
        assert_eq!(schedules[0].id, first.id);
        assert_eq!(schedules[1].id, second.id);
    }

    #[test]
    fn naive_absolute_schedule_round_trips_as_naive() {
        let (store, study) = store_with_study();
        let survey = Survey::new(&study.id, "s");
        store.create_survey(&survey).unwrap();

        let naive = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let schedule = AbsoluteSchedule::new_naive(&survey.id, naive);
        store.create_absolute_schedule(&schedule).unwrap();

        let loaded = store.absolute_schedules_of_survey(&survey.id).unwrap();
        assert!(loaded[0].scheduled_time.is_naive());

        store
            .update_absolute_schedule_time(&schedule.id, utc(2024, 1, 1, 15, 0))
            .unwrap();
        let healed = store.absolute_schedules_of_survey(&survey.id).unwrap();
        assert_eq!(
            healed[0].scheduled_time,
            StoredTime::Aware(utc(2024, 1, 1, 15, 0))
        );
    }

    #[test]
    fn intervention_dates_skip_unset() {
        let (store, study) = store_with_study();
        let intervention = Intervention::new(&study.id, "surgery");
        store.create_intervention(&intervention).unwrap();

        let with_date = Participant::new(&study.id);
        let without_date = Participant::new(&study.id);
        store.create_participant(&with_date).unwrap();
        store.create_participant(&without_date).unwrap();

        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        store
            .set_intervention_date(&with_date.id, &intervention.id, Some(date))
            .unwrap();
        store
            .set_intervention_date(&without_date.id, &intervention.id, None)
            .unwrap();

        let dates = store
            .intervention_dates_for(&intervention.id, None)
            .unwrap();
        assert_eq!(dates, vec![(with_date.id.clone(), date)]);

        let scoped = store
            .intervention_dates_for(&intervention.id, Some(&without_date.id))
            .unwrap();
        assert!(scoped.is_empty());
    }

    #[test]
    fn replace_pending_respects_scope() {
        let (store, study) = store_with_study();
        let survey = Survey::new(&study.id, "s");
        store.create_survey(&survey).unwrap();

        let weekly = ScheduledEvent::new(
            &survey.id,
            "p1",
            ScheduleSource::Weekly {
                schedule_id: "w1".into(),
            },
            utc(2024, 6, 10, 9, 0),
        );
        let absolute = ScheduledEvent::new(
            &survey.id,
            "p1",
            ScheduleSource::Absolute {
                schedule_id: "a1".into(),
            },
            utc(2024, 1, 1, 10, 0),
        );
        store
            .replace_pending(&survey.id, None, Some(ScheduleKind::Weekly), &[weekly])
            .unwrap();
        store
            .replace_pending(&survey.id, None, Some(ScheduleKind::Absolute), &[absolute])
            .unwrap();

        // Rewriting the weekly slice leaves absolute events alone.
        let replacement = ScheduledEvent::new(
            &survey.id,
            "p1",
            ScheduleSource::Weekly {
                schedule_id: "w1".into(),
            },
            utc(2024, 6, 17, 9, 0),
        );
        store
            .replace_pending(&survey.id, None, Some(ScheduleKind::Weekly), &[replacement])
            .unwrap();

        let all = store.list_pending(&survey.id, None, None).unwrap();
        assert_eq!(all.len(), 2);
        let weekly_events = store
            .list_pending(&survey.id, None, Some(ScheduleKind::Weekly))
            .unwrap();
        assert_eq!(weekly_events.len(), 1);
        assert_eq!(weekly_events[0].scheduled_time, utc(2024, 6, 17, 9, 0));
    }

    #[test]
    fn replace_pending_rolls_back_on_duplicate_insert() {
        let (store, study) = store_with_study();
        let survey = Survey::new(&study.id, "s");
        store.create_survey(&survey).unwrap();

        let original = ScheduledEvent::new(
            &survey.id,
            "p1",
            ScheduleSource::Weekly {
                schedule_id: "w1".into(),
            },
            utc(2024, 6, 10, 9, 0),
        );
        store
            .replace_pending(
                &survey.id,
                None,
                Some(ScheduleKind::Weekly),
                &[original.clone()],
            )
            .unwrap();

        // Two events violating the uniqueness index: insert fails, the
        // prior slice must survive the rollback.
        let dup_a = ScheduledEvent::new(
            &survey.id,
            "p1",
            ScheduleSource::Weekly {
                schedule_id: "w1".into(),
            },
            utc(2024, 6, 17, 9, 0),
        );
        let dup_b = ScheduledEvent::new(
            &survey.id,
            "p1",
            ScheduleSource::Weekly {
                schedule_id: "w1".into(),
            },
            utc(2024, 6, 17, 9, 0),
        );
        let result = store.replace_pending(
            &survey.id,
            None,
            Some(ScheduleKind::Weekly),
            &[dup_a, dup_b],
        );
        assert!(result.is_err());

        let events = store.list_pending(&survey.id, None, None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, original.id);
    }

    #[test]
    fn claim_pending_moves_event_to_archive() {
        let (store, study) = store_with_study();
        let survey = Survey::new(&study.id, "s");
        store.create_survey(&survey).unwrap();

        let event = ScheduledEvent::new(
            &survey.id,
            "p1",
            ScheduleSource::Absolute {
                schedule_id: "a1".into(),
            },
            utc(2024, 1, 1, 10, 0),
        );
        store
            .replace_pending(
                &survey.id,
                None,
                Some(ScheduleKind::Absolute),
                &[event.clone()],
            )
            .unwrap();

        let archived = store
            .claim_pending(&event.id, DeliveryStatus::Success)
            .unwrap()
            .unwrap();
        assert_eq!(archived.participant_id, "p1");
        assert_eq!(archived.scheduled_time, utc(2024, 1, 1, 10, 0));

        assert!(store.list_pending(&survey.id, None, None).unwrap().is_empty());
        assert!(store
            .archived_exists("p1", &survey.id, utc(2024, 1, 1, 10, 0))
            .unwrap());

        // Second claim of the same id is a no-op.
        assert!(store
            .claim_pending(&event.id, DeliveryStatus::Success)
            .unwrap()
            .is_none());
    }

    #[test]
    fn archived_participants_at_matches_exact_instant() {
        let (store, study) = store_with_study();
        let survey = Survey::new(&study.id, "s");
        store.create_survey(&survey).unwrap();

        let when = utc(2024, 1, 1, 10, 0);
        store
            .record_archived_event(&ArchivedEvent::new(
                "p1",
                &survey.id,
                when,
                DeliveryStatus::Success,
            ))
            .unwrap();
        store
            .record_archived_event(&ArchivedEvent::new(
                "p2",
                &survey.id,
                utc(2024, 1, 2, 10, 0),
                DeliveryStatus::Failed,
            ))
            .unwrap();

        let hits = store.archived_participants_at(&survey.id, when).unwrap();
        assert_eq!(hits, vec!["p1".to_string()]);
    }
}
