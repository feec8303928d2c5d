use std::fs;
use std::path::Path;

use clap::Parser;
use dimse::{DimseConfig, DimseError};
use serde::Deserialize;
use thiserror::Error;

use crate::config::{Cli, LoggingConfig, ServerConfig};
use crate::storage::StorageConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Server id must not be empty")]
    InvalidServerId,

    #[error("Unknown log level '{0}'")]
    InvalidLogLevel(String),

    #[error("Invalid [dimse] section: {0}")]
    InvalidDimse(#[from] DimseError),

    #[error("Invalid [storage] section: {0}")]
    InvalidStorage(String),
}

/// Complete configuration of a storage server
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub dimse: DimseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load the configuration named by the command line arguments
    pub fn from_args() -> Result<Self, ConfigError> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        Self::load(&cli.config_path)
    }

    /// Read, parse and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.dimse.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}
