//! Server configuration loading from files

use clickguard_server::config::{LogFormat, ServerConfig};
use std::net::IpAddr;

#[test]
fn test_load_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("server.toml"),
        r#"
host = "0.0.0.0"
port = 9090
log_format = "json"
directory_seed = "config/directory.yaml"
admin_token = "from-file"
"#,
    )
    .unwrap();

    let base = dir.path().join("server");
    let config = ServerConfig::load_from(base.to_str().unwrap()).unwrap();

    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 9090);
    assert_eq!(config.log_format, LogFormat::Json);
    assert_eq!(config.admin_token.as_deref(), Some("from-file"));
    assert_eq!(
        config.directory_seed.as_deref(),
        Some(std::path::Path::new("config/directory.yaml"))
    );
    assert!(config.database_url.is_none());
    assert!(config.trusted_proxies.is_empty());
}

#[test]
fn test_trusted_proxies_from_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("server.toml"),
        "trusted_proxies = [\"10.0.0.1\", \"::1\"]\n",
    )
    .unwrap();

    let base = dir.path().join("server");
    let config = ServerConfig::load_from(base.to_str().unwrap()).unwrap();
    let expected: Vec<IpAddr> = vec!["10.0.0.1".parse().unwrap(), "::1".parse().unwrap()];
    assert_eq!(config.trusted_proxies, expected);
}

#[test]
fn test_malformed_trusted_proxy_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("server.toml"), "trusted_proxies = [\"edge-lb\"]\n").unwrap();

    let base = dir.path().join("server");
    assert!(ServerConfig::load_from(base.to_str().unwrap()).is_err());
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("absent");
    let config = ServerConfig::load_from(base.to_str().unwrap()).unwrap();

    assert_eq!(config.port, ServerConfig::default().port);
    assert_eq!(config.log_format, LogFormat::Plain);
}

#[test]
fn test_invalid_port_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("server.toml"), "port = \"eighty\"\n").unwrap();

    let base = dir.path().join("server");
    assert!(ServerConfig::load_from(base.to_str().unwrap()).is_err());
}
