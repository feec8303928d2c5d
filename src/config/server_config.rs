use serde::Deserialize;

use crate::config::ConfigError;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Represents the identity and verbosity of this server
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub id: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            id: "harmony-store".to_string(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::InvalidServerId);
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log_level.clone()));
        }
        Ok(())
    }
}

/// Default log level for the server configuration
fn default_log_level() -> String {
    "info".to_string()
}
