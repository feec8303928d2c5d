use serde::Deserialize;
use thiserror::Error;

use crate::config::ConfigError;

pub mod filesystem;

pub use filesystem::FilesystemStore;

/// Error type for storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to write object: {0}")]
    Write(String),

    #[error("Storage task failed: {0}")]
    Task(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Where received objects are written
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_store_dir")]
    pub store_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_dir.trim().is_empty() {
            return Err(ConfigError::InvalidStorage(
                "store_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_store_dir() -> String {
    "./tmp/dimse".to_string()
}
