use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub log_to_file: bool,
    #[serde(default = "default_log_file_path")]
    pub log_file_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_to_file: false,
            log_file_path: default_log_file_path(),
        }
    }
}

fn default_log_file_path() -> String {
    "harmony-store.log".to_string()
}
