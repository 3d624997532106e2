use mimic_hostd::config::{GlobalConfig, CONFIG_PATH_ENV};

#[test]
fn empty_toml_yields_defaults() {
    let config = GlobalConfig::from_toml_str("").expect("config parses");

    assert_eq!(config.max_bots, 10);
    assert_eq!(config.tmp_dir, std::path::PathBuf::from("./tmp"));
    assert_eq!(config.db_path, std::path::PathBuf::from("./tmp/hostd.db"));
    assert_eq!(config.gateway_url, "http://localhost:8091");
    assert_eq!(config.lifecycle.heartbeat_seconds, 30);
    assert_eq!(config.lifecycle.staleness_window_seconds, 60);
    assert_eq!(config.lifecycle.watchdog_poll_seconds, 15);
}

#[test]
fn parses_overrides() {
    let toml = r#"
max_bots = 3
tmp_dir = "/var/lib/mimic"
gateway_url = "http://gateway.internal:9000"
generator_url = "http://gen.internal:9001/generate"

[lifecycle]
heartbeat_seconds = 10
staleness_window_seconds = 45
watchdog_poll_seconds = 5
"#;
    let config = GlobalConfig::from_toml_str(toml).expect("config parses");

    assert_eq!(config.max_bots, 3);
    assert_eq!(config.tmp_dir, std::path::PathBuf::from("/var/lib/mimic"));
    assert_eq!(config.gateway_url, "http://gateway.internal:9000");
    assert_eq!(config.lifecycle.heartbeat_seconds, 10);
    assert_eq!(config.lifecycle.staleness_window_seconds, 45);
    assert_eq!(config.lifecycle.watchdog_poll_seconds, 5);
}

#[test]
fn partial_lifecycle_section_keeps_other_defaults() {
    let toml = r#"
[lifecycle]
heartbeat_seconds = 5
"#;
    let config = GlobalConfig::from_toml_str(toml).expect("config parses");
    assert_eq!(config.lifecycle.heartbeat_seconds, 5);
    assert_eq!(config.lifecycle.staleness_window_seconds, 60);
}

#[test]
fn rejects_zero_max_bots() {
    let result = GlobalConfig::from_toml_str("max_bots = 0");
    assert!(result.is_err(), "max_bots = 0 must be rejected");
}

#[test]
fn rejects_zero_heartbeat() {
    let toml = r#"
[lifecycle]
heartbeat_seconds = 0
"#;
    assert!(GlobalConfig::from_toml_str(toml).is_err());
}

#[test]
fn rejects_staleness_window_not_exceeding_heartbeat() {
    let toml = r#"
[lifecycle]
heartbeat_seconds = 30
staleness_window_seconds = 30
"#;
    let result = GlobalConfig::from_toml_str(toml);
    assert!(
        result.is_err(),
        "staleness window equal to heartbeat interval must be rejected"
    );
}

#[test]
fn staleness_window_converts_to_chrono_duration() {
    let config = GlobalConfig::from_toml_str("").expect("config parses");
    assert_eq!(
        config.lifecycle.staleness_window(),
        chrono::Duration::seconds(60)
    );
}

#[test]
fn staleness_window_saturates_instead_of_panicking() {
    let toml = "
[lifecycle]
staleness_window_seconds = 9223372036854775807
";
    let config = GlobalConfig::from_toml_str(toml).expect("config parses");
    assert_eq!(config.lifecycle.staleness_window(), chrono::Duration::MAX);
}

#[test]
fn rejects_invalid_field_type() {
    let result = GlobalConfig::from_toml_str(r#"max_bots = "many""#);
    assert!(result.is_err());
}

#[test]
fn store_credentials_never_come_from_toml() {
    // endpoint/keys are serde(skip); a TOML attempt to set them fails
    // outright because of the unexpected keys.
    let toml = r#"
[store]
endpoint_url = "http://example.com"
"#;
    // toml deserialization of skipped fields: unknown fields are ignored
    // by default on GlobalConfig, but the skipped fields stay empty.
    if let Ok(config) = GlobalConfig::from_toml_str(toml) {
        assert!(config.store.endpoint_url.is_empty());
        assert!(config.store.access_key.is_empty());
        assert!(config.store.secret_key.is_empty());
    }
}

#[test]
#[serial_test::serial]
fn load_reads_file_named_by_env_var() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("hostd.toml");
    std::fs::write(&path, "max_bots = 4\n").expect("write config");

    std::env::set_var(CONFIG_PATH_ENV, &path);
    let config = GlobalConfig::load().expect("config loads");
    std::env::remove_var(CONFIG_PATH_ENV);

    assert_eq!(config.max_bots, 4);
}

#[test]
#[serial_test::serial]
fn load_falls_back_to_defaults_when_file_missing() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::env::set_var(CONFIG_PATH_ENV, temp.path().join("nope.toml"));
    let config = GlobalConfig::load().expect("defaults load");
    std::env::remove_var(CONFIG_PATH_ENV);

    assert_eq!(config.max_bots, 10);
}

#[tokio::test]
#[serial_test::serial]
async fn store_credentials_require_endpoint_env() {
    std::env::remove_var("MIMIC_STORE_URL");
    let mut config = GlobalConfig::from_toml_str("").expect("config parses");

    let err = config
        .load_store_credentials()
        .await
        .expect_err("must fail without MIMIC_STORE_URL");
    let msg = format!("{err}");
    assert!(
        msg.contains("MIMIC_STORE_URL"),
        "error should name the env var, got: {msg}"
    );
}
