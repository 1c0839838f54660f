//! Configuration management for tagstats.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Programmatic construction through [`ConfigBuilder`]
//! - Validation and defaults

use crate::core::{Result, StatsError};
use crate::export::influx::{parse_address, InfluxConfig};
use crate::export::ExportConfig;
use crate::metrics::SampleConfig;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Complete configuration for tagstats
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Value of the `server` tag recorded by the HTTP instrumentation
    pub server_name: String,
    /// Reservoir settings shared by every sample
    pub sample: SampleConfig,
    /// Status endpoint configuration
    pub status: StatusConfig,
    /// Request path naming rules, first match wins
    pub paths: Vec<PathMatch>,
    /// Export sinks, one background exporter each
    pub sinks: Vec<SinkConfig>,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Status endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Serve the status endpoint at all
    pub enabled: bool,
    /// Bind address for the status server
    pub bind_address: IpAddr,
    /// Port for the status server
    pub port: u16,
    /// Path that renders the snapshot as JSON
    pub path: String,
}

/// Maps request paths onto the value of the `path` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMatch {
    /// Path prefix to match
    pub path: String,
    /// Tag value recorded for matching requests
    pub name: String,
    /// Restrict the match to these methods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<String>>,
}

/// A configured export destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkConfig {
    /// InfluxDB HTTP write API
    Influx(InfluxSinkConfig),
}

/// InfluxDB sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxSinkConfig {
    /// Base URL of the InfluxDB server
    pub address: String,
    /// Target database
    pub database: String,
    /// Export interval
    #[serde(default = "default_export_interval", with = "humantime_serde")]
    pub interval: Duration,
    /// Optional user name, requires `password`
    #[serde(default)]
    pub username: Option<String>,
    /// Optional password, requires `username`
    #[serde(default)]
    pub password: Option<String>,
    /// Write request timeout
    #[serde(default = "default_write_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
}

/// Log levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

fn default_export_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_write_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_name: "localhost".to_string(),
            sample: SampleConfig::default(),
            status: StatusConfig::default(),
            paths: Vec::new(),
            sinks: Vec::new(),
            logging: LoggingConfig::default(),
            debug: false,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        StatusConfig {
            enabled: true,
            bind_address: IpAddr::from([127, 0, 0, 1]),
            port: 9090,
            path: "/stats".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
        }
    }
}

impl InfluxSinkConfig {
    /// Create a sink config with default interval and timeout
    pub fn new(address: impl Into<String>, database: impl Into<String>) -> Self {
        InfluxSinkConfig {
            address: address.into(),
            database: database.into(),
            interval: default_export_interval(),
            username: None,
            password: None,
            timeout: default_write_timeout(),
        }
    }

    /// Validate this sink
    pub fn validate(&self) -> Result<()> {
        parse_address(&self.address)?;

        if self.database.trim().is_empty() {
            return Err(StatsError::config("influx database must not be empty"));
        }

        if self.interval.is_zero() {
            return Err(StatsError::config("export interval must be greater than 0"));
        }

        if self.timeout.is_zero() {
            return Err(StatsError::config("write timeout must be greater than 0"));
        }

        if self.username.is_some() != self.password.is_some() {
            return Err(StatsError::config(
                "influx username and password must be given together",
            ));
        }

        Ok(())
    }

    /// Client settings for this sink
    pub fn client_config(&self) -> InfluxConfig {
        InfluxConfig {
            address: self.address.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout: self.timeout,
        }
    }

    /// Export loop settings for this sink
    pub fn export_config(&self) -> ExportConfig {
        ExportConfig {
            interval: self.interval,
            database: self.database.clone(),
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.sample.validate()?;

        if self.status.path.is_empty() || !self.status.path.starts_with('/') {
            return Err(StatsError::config(format!(
                "status path must start with '/', got '{}'",
                self.status.path
            )));
        }

        if self.status.path == "/health" {
            return Err(StatsError::config("status path '/health' is reserved"));
        }

        for path in &self.paths {
            if path.path.is_empty() || path.name.is_empty() {
                return Err(StatsError::config(format!(
                    "path match needs both a path and a name, got '{}' -> '{}'",
                    path.path, path.name
                )));
            }
        }

        for sink in &self.sinks {
            match sink {
                SinkConfig::Influx(influx) => influx.validate()?,
            }
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| StatsError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set the server tag value
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.config.server_name = name.into();
        self
    }

    /// Set status server port
    pub fn status_port(mut self, port: u16) -> Self {
        self.config.status.port = port;
        self
    }

    /// Set status path
    pub fn status_path(mut self, path: impl Into<String>) -> Self {
        self.config.status.path = path.into();
        self
    }

    /// Enable or disable the status server
    pub fn status_enabled(mut self, enabled: bool) -> Self {
        self.config.status.enabled = enabled;
        self
    }

    /// Add a path naming rule
    pub fn path(mut self, path: PathMatch) -> Self {
        self.config.paths.push(path);
        self
    }

    /// Add an export sink
    pub fn sink(mut self, sink: SinkConfig) -> Self {
        self.config.sinks.push(sink);
        self
    }

    /// Set the reported percentile
    pub fn percentile(mut self, percentile: f64) -> Self {
        self.config.sample.percentile = percentile;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.sinks.is_empty());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut sink = InfluxSinkConfig::new("http://localhost:8086", "stats");
        sink.interval = Duration::ZERO;
        let config = ConfigBuilder::new().sink(SinkConfig::Influx(sink)).build();
        assert!(config.is_err());
    }

    #[test]
    fn test_malformed_address_rejected() {
        for address in ["localhost:8086", "ftp://localhost", "not a url", ""] {
            let sink = InfluxSinkConfig::new(address, "stats");
            assert!(sink.validate().is_err(), "{address} should be rejected");
        }
    }

    #[test]
    fn test_credentials_must_be_paired() {
        let mut sink = InfluxSinkConfig::new("http://localhost:8086", "stats");
        sink.username = Some("admin".to_string());
        assert!(sink.validate().is_err());

        sink.password = Some("secret".to_string());
        assert!(sink.validate().is_ok());
    }

    #[test]
    fn test_status_path_must_be_absolute() {
        assert!(ConfigBuilder::new().status_path("stats").build().is_err());
        assert!(ConfigBuilder::new().status_path("").build().is_err());
        assert!(ConfigBuilder::new().status_path("/metrics").build().is_ok());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
server_name: web-1
paths:
  - path: /api
    name: api
    methods: [GET, POST]
sinks:
  - kind: influx
    address: http://influx.local:8086
    database: caddy
    interval: 30s
"#;

        let config = ConfigBuilder::new().from_yaml(yaml).unwrap().build().unwrap();
        assert_eq!(config.server_name, "web-1");
        assert_eq!(config.paths.len(), 1);
        assert_eq!(
            config.paths[0].methods.as_deref(),
            Some(&["GET".to_string(), "POST".to_string()][..])
        );

        let SinkConfig::Influx(sink) = &config.sinks[0];
        assert_eq!(sink.interval, Duration::from_secs(30));
        assert_eq!(sink.timeout, Duration::from_secs(10));
        assert_eq!(sink.export_config().database, "caddy");
    }

    #[test]
    fn test_unknown_sink_kind_rejected() {
        let yaml = r#"
sinks:
  - kind: graphite
    address: http://localhost
    database: stats
"#;
        assert!(ConfigBuilder::new().from_yaml(yaml).is_err());
    }
}
