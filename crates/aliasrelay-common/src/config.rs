//! Configuration for AliasRelay

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable prefix, e.g. `ALIASRELAY__ROUTING__WORKER_DOMAIN`
pub const ENV_PREFIX: &str = "ALIASRELAY";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Routing configuration
    pub routing: RoutingConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Inbound SMTP configuration
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Outbound relay configuration
    #[serde(default)]
    pub relay: RelayConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname announced in the SMTP banner
    #[serde(default = "default_hostname")]
    pub hostname: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
        }
    }
}

fn default_hostname() -> String {
    "localhost".to_string()
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// The only domain this instance routes mail for
    pub worker_domain: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database backend (only "postgres" is supported)
    #[serde(default = "default_db_backend")]
    pub backend: String,

    /// Database URL
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_db_backend() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Inbound SMTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Bind host
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// SMTP port (inbound)
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Maximum message size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Maximum concurrent connections
    #[serde(default = "default_smtp_max_connections")]
    pub max_connections: usize,

    /// Idle timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            max_message_size: default_max_message_size(),
            max_connections: default_smtp_max_connections(),
            connection_timeout_secs: default_connection_timeout(),
        }
    }
}

fn default_smtp_host() -> String {
    "0.0.0.0".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_max_message_size() -> usize {
    25 * 1024 * 1024 // 25 MB
}

fn default_smtp_max_connections() -> usize {
    100
}

fn default_connection_timeout() -> u64 {
    300
}

/// Outbound relay (smarthost) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay host
    #[serde(default = "default_relay_host")]
    pub host: String,

    /// Relay port
    #[serde(default = "default_relay_port")]
    pub port: u16,

    /// Connection security: "none", "starttls" or "tls"
    #[serde(default = "default_relay_security")]
    pub security: String,

    /// Username for relay authentication
    pub username: Option<String>,

    /// Password for relay authentication
    pub password: Option<String>,

    /// Destinations allowed as forward targets. Empty means any.
    #[serde(default)]
    pub verified_destinations: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_relay_host(),
            port: default_relay_port(),
            security: default_relay_security(),
            username: None,
            password: None,
            verified_destinations: Vec::new(),
        }
    }
}

fn default_relay_host() -> String {
    "localhost".to_string()
}

fn default_relay_port() -> u16 {
    587
}

fn default_relay_security() -> String {
    "starttls".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        config.prepared()
    }

    /// Load configuration from the default file locations and environment
    pub fn load() -> crate::Result<Self> {
        let paths = [
            PathBuf::from("./config.toml"),
            PathBuf::from("/etc/aliasrelay/config.toml"),
        ];

        let path = paths.iter().find(|p| p.exists());
        Self::load_from(path.map(PathBuf::as_path))
    }

    /// Load configuration from an optional file, overlaid with
    /// `ALIASRELAY__SECTION__KEY` environment variables
    pub fn load_from(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder
                .add_source(::config::File::from(path).format(::config::FileFormat::Toml));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("relay.verified_destinations"),
        );

        let config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize::<Config>())
            .map_err(|e| crate::Error::Config(format!("Failed to load config: {}", e)))?;

        config.prepared()
    }

    /// Canonicalize values the router compares against and validate them
    fn prepared(mut self) -> crate::Result<Self> {
        self.routing.worker_domain = self.routing.worker_domain.trim().to_lowercase();
        self.relay.verified_destinations = self
            .relay
            .verified_destinations
            .iter()
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        let domain = &self.routing.worker_domain;
        if domain.is_empty() {
            return Err(crate::Error::Config(
                "routing.worker_domain must be set".to_string(),
            ));
        }
        if domain.contains('@') || domain.chars().any(char::is_whitespace) {
            return Err(crate::Error::Config(format!(
                "routing.worker_domain is not a domain: {}",
                domain
            )));
        }

        match self.relay.security.as_str() {
            "none" | "starttls" | "tls" => {}
            other => {
                return Err(crate::Error::Config(format!(
                    "Unsupported relay security mode: {}",
                    other
                )))
            }
        }

        if self.smtp.max_connections == 0 {
            return Err(crate::Error::Config(
                "smtp.max_connections must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
