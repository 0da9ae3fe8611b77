//! Server configuration

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,

    /// Server port (HTTP)
    pub port: u16,

    /// Log output format
    pub log_format: LogFormat,

    /// Pipeline thresholds and webhook targets (YAML)
    pub pipeline_config: Option<PathBuf>,

    /// Campaign/affiliate directory seed (YAML)
    pub directory_seed: Option<PathBuf>,

    /// Server-held secret; overrides the one in the pipeline config
    #[serde(skip_serializing)]
    pub server_secret: Option<String>,

    /// Bearer token required on review and admin endpoints when set
    #[serde(skip_serializing)]
    pub admin_token: Option<String>,

    /// PostgreSQL URL; in-memory stores are used when unset
    #[serde(skip_serializing)]
    pub database_url: Option<String>,

    /// Reverse proxies allowed to set `X-Forwarded-For`; empty means the
    /// socket peer is always the client
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_format: LogFormat::Plain,
            pipeline_config: None,
            directory_seed: None,
            server_secret: None,
            admin_token: None,
            database_url: None,
            trusted_proxies: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and config file
    ///
    /// Sources in increasing precedence: defaults, `config/server.*`,
    /// `CLICKGUARD_*` variables (e.g. `CLICKGUARD_PORT`, `CLICKGUARD_ADMIN_TOKEN`,
    /// `CLICKGUARD_TRUSTED_PROXIES=10.0.0.1,10.0.0.2`).
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if exists
        dotenvy::dotenv().ok();
        Self::load_from("config/server")
    }

    pub fn load_from(file: &str) -> anyhow::Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("CLICKGUARD")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("trusted_proxies"),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to read config: {}", e))?;

        cfg.try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize config: {}", e))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (log={:?}, trusted_proxies={}, admin_token={}, storage={})",
            self.bind_address(),
            self.log_format,
            self.trusted_proxies.len(),
            if self.admin_token.is_some() { "set" } else { "unset" },
            if self.database_url.is_some() { "postgres" } else { "memory" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Plain);
        assert!(config.admin_token.is_none());
        assert!(config.database_url.is_none());
        assert!(config.trusted_proxies.is_empty());
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_display_hides_secrets() {
        let config = ServerConfig {
            admin_token: Some("super-secret-token".to_string()),
            server_secret: Some("another-secret-value".to_string()),
            ..Default::default()
        };
        let shown = config.to_string();
        assert!(!shown.contains("super-secret-token"));
        assert!(!shown.contains("another-secret-value"));
        assert!(shown.contains("admin_token=set"));
    }

    #[test]
    fn test_log_format_deserialize() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
    }
}
