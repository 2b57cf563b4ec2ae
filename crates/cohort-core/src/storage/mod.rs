mod config;
pub mod migrations;
pub mod store;

pub use config::Config;
pub use store::StudyStore;

use std::path::PathBuf;

use crate::error::CoreError;

/// Returns `~/.config/cohort[-dev]/` based on COHORT_ENV.
///
/// Set COHORT_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, CoreError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("COHORT_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("cohort-dev")
    } else {
        base_dir.join("cohort")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
