#![allow(clippy::unwrap_used)]
// Loading and saving config files on disk.

use std::time::Duration;

use pretty_assertions::assert_eq;

use ripley_config::{Config, ConfigError, LogFormat, load_config_from, save_config};

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg, Config::default());
}

#[test]
fn file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
url = "https://ripper.lan:8443"
insecure = true
log_format = "json"

[reconnect]
base_delay_ms = 250

[resync]
operations_secs = 0
"#,
    )
    .unwrap();

    let cfg = load_config_from(&path).unwrap();
    assert_eq!(cfg.log_format, LogFormat::Json);
    assert_eq!(cfg.reconnect.max_attempts, 5, "unset keys keep defaults");

    let client = cfg.to_client_config().unwrap();
    assert_eq!(client.base_url.as_str(), "https://ripper.lan:8443/");
    assert!(client.accept_invalid_certs);
    assert_eq!(client.reconnect.base_delay, Duration::from_millis(250));
    assert_eq!(client.resync.operations, None);
    assert_eq!(client.resync.drives, Some(Duration::from_secs(5)));
}

#[test]
fn malformed_file_is_a_figment_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "timeout = \"soon\"\n").unwrap();

    assert!(matches!(
        load_config_from(&path),
        Err(ConfigError::Figment(_))
    ));
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let mut cfg = Config {
        url: "http://10.0.0.5:3000".into(),
        log_capacity: 250,
        ..Config::default()
    };
    cfg.resync.logs_secs = 15;

    save_config(&cfg, &path).unwrap();
    assert_eq!(load_config_from(&path).unwrap(), cfg);
}
