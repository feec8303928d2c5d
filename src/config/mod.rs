mod tests;
mod server_config;
mod logging_config;
pub mod config;

use clap::Parser;

pub use config::{Config, ConfigError};
pub use logging_config::LoggingConfig;
pub use server_config::ServerConfig;

/// Structure representing application startup arguments or metadata.
#[derive(Debug, Parser)]
#[command(name = "harmony-store", about = "DICOM storage SCP")]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long = "config", default_value = "config.toml")]
    pub config_path: String,
}

impl Cli {
    /// Creates a new `Cli` instance with the provided configuration path.
    ///
    /// # Arguments
    /// - `config_path`: The path to the configuration file.
    pub fn new(config_path: String) -> Self {
        Self { config_path }
    }
}
