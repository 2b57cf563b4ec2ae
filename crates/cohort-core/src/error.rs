//! Core error types for cohort-core.
//!
//! This module defines the error hierarchy using thiserror. Schedule
//! errors are deliberately separate from database errors: a
//! `ScheduleError::NoWeeklySchedules` is an expected signal ("nothing
//! to schedule this cycle"), not a system failure.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for cohort-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Schedule computation and timezone errors
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A referenced row does not exist
    #[error("Unknown {entity}: {id}")]
    NotFound { entity: &'static str, id: String },
}

/// Schedule computation errors.
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// Weekly reconciliation was invoked for a survey with zero weekly
    /// schedule rows. Non-fatal: callers treat this as "nothing to
    /// schedule this cycle" and leave the pending table untouched.
    #[error("Survey {survey_id} has no weekly schedules")]
    NoWeeklySchedules { survey_id: String },

    /// A study's stored timezone is not a valid IANA name.
    #[error("Study {study_id} has invalid timezone '{name}'")]
    InvalidTimezone { study_id: String, name: String },

    /// A wall-clock time cannot be resolved in the target timezone,
    /// even after adjusting for a spring-forward gap.
    #[error("Local time {local} does not resolve in timezone {timezone}")]
    UnresolvableLocalTime {
        local: chrono::NaiveDateTime,
        timezone: chrono_tz::Tz,
    },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(DatabaseError::from(err))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
