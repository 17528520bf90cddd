//! LedgerSoak Settings
//!
//! JSON settings file for soak runs.
//!
//! ## Sections
//!
//! - `network`: node endpoints
//! - `workload`: actor count and transfer amounts
//! - `timing`: poll intervals, pause bound, confirmation deadline
//! - `simulation`: simulated cluster size and per-node faults
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::PathBuf;
//! use ledgersoak_settings::Settings;
//!
//! let mut settings = Settings::load_from(&PathBuf::from("ledgersoak.json"))?;
//! settings.workload.actors = 8;
//! settings.save()?;
//! # Ok::<(), ledgersoak_settings::SettingsError>(())
//! ```

mod config;

pub use config::{NetworkSettings, Settings, SimulationSettings, TimingSettings, WorkloadSettings};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Failed to create config directory: {0}")]
    CreateDirError(std::io::Error),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Settings file used when none is given
pub fn default_settings_path() -> PathBuf {
    PathBuf::from("ledgersoak.json")
}
