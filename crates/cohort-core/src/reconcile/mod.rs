//! Schedule reconciliation engine.
//!
//! Reconciliation derives the pending-event table from the schedule
//! definitions: each reconciler deletes the pending events in its scope
//! and rebuilds them from current definitions inside one transaction,
//! so the table is always a pure function of (definitions, archive,
//! now) and re-running is harmless.
//!
//! Per-kind rules live in the `weekly`, `absolute`, and `relative`
//! submodules.
//!
//! ## Usage
//! ```rust,ignore
//! use cohort_core::{ReconcileEngine, StudyStore};
//!
//! let store = StudyStore::open()?;
//! let engine = ReconcileEngine::new(&store);
//! let outcome = engine.reconcile_study(&study_id, None)?;
//! for failure in &outcome.failures {
//!     eprintln!("survey {} failed: {}", failure.survey_id, failure.message);
//! }
//! ```

pub mod absolute;
pub mod relative;
pub mod weekly;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, DatabaseError, ScheduleError};
use crate::storage::StudyStore;

/// Result of reconciling one survey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyOutcome {
    pub survey_id: String,
    /// True when the survey is soft-deleted and its pending events were
    /// purged instead of rebuilt.
    pub purged: bool,
    /// Pending events created per schedule kind.
    pub weekly_created: usize,
    pub absolute_created: usize,
    pub relative_created: usize,
    /// True when the survey defines no weekly schedules; the weekly
    /// slice of the pending table was left untouched.
    pub weekly_skipped: bool,
}

impl SurveyOutcome {
    fn purged(survey_id: impl Into<String>) -> Self {
        Self {
            survey_id: survey_id.into(),
            purged: true,
            weekly_created: 0,
            absolute_created: 0,
            relative_created: 0,
            weekly_skipped: false,
        }
    }

    pub fn total_created(&self) -> usize {
        self.weekly_created + self.absolute_created + self.relative_created
    }
}

/// A survey whose reconciliation failed during a study-wide run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyFailure {
    pub survey_id: String,
    pub message: String,
}

/// Result of a study-wide reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyOutcome {
    pub study_id: String,
    pub surveys: Vec<SurveyOutcome>,
    /// Surveys that failed; the rest of the run proceeded regardless.
    pub failures: Vec<SurveyFailure>,
}

impl StudyOutcome {
    pub fn total_created(&self) -> usize {
        self.surveys.iter().map(SurveyOutcome::total_created).sum()
    }
}

/// Reconciliation engine over a study store.
///
/// Concurrent runs over the same survey are not coordinated here;
/// callers serialize them (the CLI runs one process at a time).
pub struct ReconcileEngine<'a> {
    store: &'a StudyStore,
}

impl<'a> ReconcileEngine<'a> {
    pub fn new(store: &'a StudyStore) -> Self {
        Self { store }
    }

    /// Reconcile one survey as of the current instant.
    ///
    /// `participant` narrows the rebuild to a single participant's
    /// pending events; None reconciles every participant of the study.
    ///
    /// # Errors
    /// Returns an error if the survey is unknown, the study timezone is
    /// invalid, or a storage operation fails. A failed run never leaves
    /// the pending table partially rewritten.
    pub fn reconcile_survey(
        &self,
        survey_id: &str,
        participant: Option<&str>,
    ) -> Result<SurveyOutcome, CoreError> {
        self.reconcile_survey_at(survey_id, participant, Utc::now())
    }

    /// Reconcile one survey as of an explicit instant (for tests and
    /// dry runs).
    pub fn reconcile_survey_at(
        &self,
        survey_id: &str,
        participant: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SurveyOutcome, CoreError> {
        let survey = self
            .store
            .get_survey(survey_id)?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "survey",
                id: survey_id.to_string(),
            })?;

        // A soft-deleted survey keeps its definitions but must not hold
        // pending events of any kind, for any participant. The purge
        // ignores the participant scope: a scoped run must not leave
        // other participants' events deliverable.
        if survey.deleted {
            self.store.replace_pending(survey_id, None, None, &[])?;
            return Ok(SurveyOutcome::purged(survey_id));
        }

        let study = self.store.study_of_survey(survey_id)?;
        let tz = study.tz()?;
        let local_now = now.with_timezone(&tz);

        let (weekly_created, weekly_skipped) =
            match weekly::reconcile(self.store, &survey, local_now, participant) {
                Ok(count) => (count, false),
                // No weekly definitions: leave the weekly slice alone.
                Err(CoreError::Schedule(ScheduleError::NoWeeklySchedules { .. })) => (0, true),
                Err(err) => return Err(err),
            };
        let absolute_created = absolute::reconcile(self.store, &survey, tz, participant)?;
        let relative_created = relative::reconcile(self.store, &survey, tz, participant)?;

        Ok(SurveyOutcome {
            survey_id: survey_id.to_string(),
            purged: false,
            weekly_created,
            absolute_created,
            relative_created,
            weekly_skipped,
        })
    }

    /// Reconcile every survey of a study, soft-deleted ones included
    /// (those get purged). `participant` narrows every survey's rebuild
    /// to one participant, the entry point after a participant edit.
    ///
    /// One survey failing never aborts the run: its error is recorded
    /// in `failures` and the remaining surveys proceed. A failed survey
    /// keeps its previous pending events.
    pub fn reconcile_study(
        &self,
        study_id: &str,
        participant: Option<&str>,
    ) -> Result<StudyOutcome, CoreError> {
        self.reconcile_study_at(study_id, participant, Utc::now())
    }

    pub fn reconcile_study_at(
        &self,
        study_id: &str,
        participant: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StudyOutcome, CoreError> {
        let study = self
            .store
            .get_study(study_id)?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "study",
                id: study_id.to_string(),
            })?;

        let mut outcome = StudyOutcome {
            study_id: study.id.clone(),
            surveys: Vec::new(),
            failures: Vec::new(),
        };

        for survey in self.store.surveys_of_study(&study.id)? {
            match self.reconcile_survey_at(&survey.id, participant, now) {
                Ok(survey_outcome) => outcome.surveys.push(survey_outcome),
                Err(err) => outcome.failures.push(SurveyFailure {
                    survey_id: survey.id.clone(),
                    message: err.to_string(),
                }),
            }
        }

        Ok(outcome)
    }
}
