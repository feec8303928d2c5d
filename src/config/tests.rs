#![cfg(test)]

use std::io::Write;

use crate::config::config::{Config, ConfigError};
use crate::config::Cli;

/// Parse a TOML string into a `Config` and run the project's validation logic.
fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let cfg: Config = toml::from_str(toml_str)?;
    cfg.validate()?;
    Ok(cfg)
}

#[test]
fn test_basic_config() {
    let toml = r#"
        [server]
        id = "store-test"
        log_level = "info"

        [dimse]
        local_aet = "STORE_SCP"
        bind_addr = "127.0.0.1"
        port = 4242

        [storage]
        store_dir = "/tmp/harmony-store"
    "#;

    let config = load_config_from_str(toml).expect("valid config");
    assert_eq!(config.server.id, "store-test");
    assert_eq!(config.dimse.local_aet, "STORE_SCP");
    assert_eq!(config.dimse.port, 4242);
    assert_eq!(config.storage.store_dir, "/tmp/harmony-store");
    assert!(!config.logging.log_to_file);
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = load_config_from_str("").expect("defaults are valid");
    assert_eq!(config.server.log_level, "info");
    assert_eq!(config.dimse.local_aet, "HARMONY_SCP");
    assert_eq!(config.dimse.port, dimse::DEFAULT_DIMSE_PORT);
}

#[test]
fn test_empty_server_id_is_rejected() {
    let toml = r#"
        [server]
        id = "  "
    "#;
    assert!(matches!(
        load_config_from_str(toml),
        Err(ConfigError::InvalidServerId)
    ));
}

#[test]
fn test_unknown_log_level_is_rejected() {
    let toml = r#"
        [server]
        id = "store-test"
        log_level = "chatty"
    "#;
    assert!(matches!(
        load_config_from_str(toml),
        Err(ConfigError::InvalidLogLevel(_))
    ));
}

#[test]
fn test_invalid_dimse_section_is_rejected() {
    let toml = r#"
        [dimse]
        local_aet = "THIS_AE_TITLE_IS_TOO_LONG"
    "#;
    assert!(matches!(
        load_config_from_str(toml),
        Err(ConfigError::InvalidDimse(_))
    ));
}

#[test]
fn test_load_from_cli_path() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"
        [server]
        id = "from-file"

        [dimse]
        local_aet = "FILE_SCP"
        strict = true
        allowed_peers = ["CT01"]
        "#
    )
    .unwrap();

    let cli = Cli::new(file.path().display().to_string());
    let config = Config::from_cli(cli).expect("config loads");
    assert_eq!(config.server.id, "from-file");
    assert!(config.dimse.strict);
    assert!(config.dimse.is_allowed_peer("CT01"));
}

#[test]
fn test_missing_file_is_reported() {
    let result = Config::load("/nonexistent/harmony-store.toml");
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}
