//! Bridge settings

use crate::core::bridge::BridgeSettings;
use crate::core::identity::{Identity, OFFLINE_IDENTITY};
use crate::core::transport::SerialConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("{}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be rendered
    #[error("Could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("Invalid value: {0}")]
    Invalid(String),
}

/// Complete bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Run without a device attached
    pub offline: bool,
    /// Serial port settings
    pub serial: SerialConfig,
    /// Bus settings
    pub bus: BusConfig,
    /// Identity negotiation settings
    pub negotiation: NegotiationConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Bus connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Relay address (host:port)
    pub address: String,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:7878".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl BusConfig {
    /// Connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Identity negotiation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Wait after each device query, in milliseconds
    pub settle_delay_ms: u64,
    /// Identity announced in offline mode
    pub offline_identity: String,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 2000,
            offline_identity: OFFLINE_IDENTITY.to_string(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of plain text
    pub json: bool,
    /// Also write daily-rolling log files here
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}

impl BridgeConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => match super::default_config_path() {
                Some(path) => Self::load_from(&path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Load from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Save to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Startup settings for the bridge
    pub fn bridge_settings(&self) -> Result<BridgeSettings, ConfigError> {
        let offline_identity = Identity::new(self.negotiation.offline_identity.clone())
            .map_err(|e| ConfigError::Invalid(format!("negotiation.offline_identity: {e}")))?;

        Ok(BridgeSettings {
            settle_delay: Duration::from_millis(self.negotiation.settle_delay_ms),
            offline_identity,
        })
    }
}
