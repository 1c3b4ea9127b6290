//! Configuration module
//!
//! Handles bridge settings loaded from TOML

mod settings;

pub use settings::{BridgeConfig, BusConfig, ConfigError, LoggingConfig, NegotiationConfig};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "linebridge", "Linebridge").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}
