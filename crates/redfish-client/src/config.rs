//! Client configuration with YAML support
//!
//! Credentials are deliberately absent: they are passed to
//! [`RedfishClient::new`](crate::RedfishClient::new) programmatically and
//! never read from a config file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::endpoints::DEFAULT_PLATFORM;

/// Redfish client configuration
///
/// Can be loaded from YAML, JSON, or constructed programmatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Connection settings
    pub connection: ConnectionConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Polling settings for tasks and the firmware inventory
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// BMC host name or address
    pub host: String,

    /// Port (default: 443)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Use HTTPS (default: true)
    #[serde(default = "default_true")]
    pub https: bool,

    /// Verify the BMC's TLS certificate (default: false, BMCs ship self-signed certs)
    #[serde(default)]
    pub verify_ssl: bool,

    /// Platform type key into the endpoint map
    #[serde(default = "default_platform")]
    pub platform: String,

    /// ComputerSystem id targeted by reset actions
    #[serde(default = "default_system_id")]
    pub system_id: String,
}

fn default_port() -> u16 {
    443
}

fn default_true() -> bool {
    true
}

fn default_platform() -> String {
    DEFAULT_PLATFORM.to_string()
}

fn default_system_id() -> String {
    "1".to_string()
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Per-request timeout in milliseconds (default: 60s)
    #[serde(default = "default_request_timeout")]
    pub request_ms: u64,

    /// Connect timeout in milliseconds (default: 10s)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_ms: default_request_timeout(),
            connect_ms: default_connect_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60_000
}

fn default_connect_timeout() -> u64 {
    10_000
}

/// Polling configuration used by the high-level update run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Task poll interval in milliseconds (default: 5s)
    #[serde(default = "default_task_poll")]
    pub task_poll_ms: u64,

    /// Overall task timeout in milliseconds (default: 15 minutes)
    #[serde(default = "default_task_timeout")]
    pub task_timeout_ms: u64,

    /// Firmware inventory poll interval in milliseconds (default: 3s)
    #[serde(default = "default_inventory_poll")]
    pub inventory_poll_ms: u64,

    /// Firmware inventory wait timeout in milliseconds (default: 5 minutes)
    #[serde(default = "default_inventory_timeout")]
    pub inventory_timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            task_poll_ms: default_task_poll(),
            task_timeout_ms: default_task_timeout(),
            inventory_poll_ms: default_inventory_poll(),
            inventory_timeout_ms: default_inventory_timeout(),
        }
    }
}

fn default_task_poll() -> u64 {
    5_000
}

fn default_task_timeout() -> u64 {
    900_000
}

fn default_inventory_poll() -> u64 {
    3_000
}

fn default_inventory_timeout() -> u64 {
    300_000
}

impl PollingConfig {
    pub fn task_poll_interval(&self) -> Duration {
        Duration::from_millis(self.task_poll_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn inventory_poll_interval(&self) -> Duration {
        Duration::from_millis(self.inventory_poll_ms)
    }

    pub fn inventory_timeout(&self) -> Duration {
        Duration::from_millis(self.inventory_timeout_ms)
    }
}

impl ClientConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Create a builder for programmatic configuration
    pub fn builder(host: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(host)
    }

    /// Base URL of the BMC, e.g. `https://10.0.0.5:443`
    pub fn base_url(&self) -> String {
        let scheme = if self.connection.https { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.connection.host, self.connection.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.request_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.connect_ms)
    }
}

/// Builder for ClientConfig
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder for the given BMC host
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                connection: ConnectionConfig {
                    host: host.into(),
                    port: default_port(),
                    https: true,
                    verify_ssl: false,
                    platform: default_platform(),
                    system_id: default_system_id(),
                },
                timeouts: TimeoutsConfig::default(),
                polling: PollingConfig::default(),
            },
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.connection.port = port;
        self
    }

    /// Use HTTPS (true) or plain HTTP (false)
    pub fn https(mut self, https: bool) -> Self {
        self.config.connection.https = https;
        self
    }

    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.config.connection.verify_ssl = verify;
        self
    }

    /// Set the platform type used for endpoint resolution
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.config.connection.platform = platform.into();
        self
    }

    pub fn system_id(mut self, id: impl Into<String>) -> Self {
        self.config.connection.system_id = id.into();
        self
    }

    /// Set request timeout in milliseconds
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.request_ms = ms;
        self
    }

    /// Set connect timeout in milliseconds
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.connect_ms = ms;
        self
    }

    /// Set task poll interval and timeout in milliseconds
    pub fn task_polling_ms(mut self, interval: u64, timeout: u64) -> Self {
        self.config.polling.task_poll_ms = interval;
        self.config.polling.task_timeout_ms = timeout;
        self
    }

    /// Set firmware inventory poll interval and timeout in milliseconds
    pub fn inventory_polling_ms(mut self, interval: u64, timeout: u64) -> Self {
        self.config.polling.inventory_poll_ms = interval;
        self.config.polling.inventory_timeout_ms = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
