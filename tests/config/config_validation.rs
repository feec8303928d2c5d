use harmony_store::config::{Cli, Config, ConfigError};

fn load_config_from_str(toml: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(toml).expect("TOML parse error");
    config.validate()?;
    Ok(config)
}

#[test]
fn test_sample_config_loads() {
    let config_path = format!("{}/config.toml", env!("CARGO_MANIFEST_DIR"));
    let config = Config::from_cli(Cli::new(config_path)).expect("sample config is valid");

    assert_eq!(config.server.id, "harmony-store");
    assert_eq!(config.dimse.local_aet, "HARMONY_SCP");
    assert_eq!(config.dimse.port, 11112);
    assert_eq!(config.storage.store_dir, "./tmp/dimse");
}

#[test]
fn test_strict_config() {
    let toml = r#"
        [server]
        id = "store-strict"
        log_level = "debug"

        [dimse]
        local_aet = "STORE_SCP"
        strict = true
        allowed_peers = ["CT01", "MR02"]
        max_associations = 2
    "#;

    let config = load_config_from_str(toml).expect("valid config");
    assert!(config.dimse.strict);
    assert!(config.dimse.is_allowed_peer("MR02"));
    assert!(!config.dimse.is_allowed_peer("US03"));
    assert_eq!(config.dimse.max_associations, 2);
}

#[test]
fn test_invalid_allowed_peer_fails() {
    let toml = r#"
        [dimse]
        local_aet = "STORE_SCP"
        allowed_peers = ["BAD\\PEER"]
    "#;

    let result = load_config_from_str(toml);
    assert!(matches!(result, Err(ConfigError::InvalidDimse(_))));
}

#[test]
fn test_pdu_size_out_of_range_fails() {
    let toml = r#"
        [dimse]
        local_aet = "STORE_SCP"
        max_pdu = 1024
    "#;

    let result = load_config_from_str(toml);
    assert!(matches!(result, Err(ConfigError::InvalidDimse(_))));
}

#[test]
fn test_unknown_transfer_syntax_fails() {
    let toml = r#"
        [dimse]
        local_aet = "STORE_SCP"
        transfer_syntax = "1.2.3.4.5.6"
    "#;

    let result = load_config_from_str(toml);
    assert!(matches!(result, Err(ConfigError::InvalidDimse(_))));
}

#[test]
fn test_empty_store_dir_fails() {
    let toml = r#"
        [storage]
        store_dir = ""
    "#;

    let result = load_config_from_str(toml);
    assert!(matches!(result, Err(ConfigError::InvalidStorage(_))));
}
