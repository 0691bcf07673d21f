//! Careflow Common Library
//!
//! Shared error taxonomy, configuration, domain records and fixture
//! generation for the Careflow workflow runner.

pub mod config;
pub mod error;
pub mod fixtures;
pub mod types;

// Re-export commonly used types
pub use config::{
    BackoffConfig, ConfigFile, Credentials, RetryConfig, WorkflowConfig, MAX_SLOT_NOTICE_MINUTES,
};
pub use error::{Error, Result};
pub use fixtures::{AppointmentWindow, FixtureGenerator};
pub use types::*;

/// Default configuration file path
pub fn default_config_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".careflow")
        .join("config.toml")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
