//! # Cohort Core Library
//!
//! This library provides the schedule reconciliation engine for
//! longitudinal-study notification schedules. It implements a CLI-first
//! philosophy where all operations are available via a standalone CLI
//! binary over the same core library.
//!
//! ## Architecture
//!
//! - **Reconciliation**: derives the pending-notification table from
//!   schedule definitions; rebuilding is idempotent and safe to run at
//!   any time
//! - **Storage**: SQLite-based study/schedule storage and TOML-based
//!   configuration
//! - **Archive**: immutable delivery history used as a negative lookup
//!   so a fired notification is never re-offered
//!
//! ## Key Components
//!
//! - [`ReconcileEngine`]: per-survey and study-wide reconciliation
//! - [`StudyStore`]: study, schedule, pending-event, and archive persistence
//! - [`Config`]: application configuration management

pub mod error;
pub mod model;
pub mod reconcile;
pub mod storage;

pub use error::{ConfigError, CoreError, DatabaseError, ScheduleError};
pub use model::{
    AbsoluteSchedule, ArchivedEvent, DeliveryStatus, Intervention, Participant, RelativeSchedule,
    ScheduleKind, ScheduleSource, ScheduledEvent, Study, Survey, TimeOfDay, WeeklySchedule,
};
pub use reconcile::{ReconcileEngine, StudyOutcome, SurveyOutcome};
pub use storage::{Config, StudyStore};
