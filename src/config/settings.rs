//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::fmt;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default protocols.io API root. Tool paths start with `/v3` or `/v4`.
pub const DEFAULT_API_URL: &str = "https://www.protocols.io/api";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// protocols.io API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// MCP transport settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Applies environment overrides for the API credentials.
    ///
    /// `lookup` resolves a variable name to its value; `main` passes
    /// `std::env::var`, tests pass a fixed table.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(super::API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(token) = lookup(super::ACCESS_TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.api.access_token = token.trim().to_string();
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api.base_url.as_str();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::ValidationError {
                message: format!("API base URL '{url}' must start with http:// or https://"),
            });
        }

        if self.api.access_token.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "access token is not set; provide api.access_token or {}",
                    super::ACCESS_TOKEN_ENV
                ),
            });
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "api.timeout_secs must be greater than zero".to_string(),
            });
        }

        if self.server.host.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "server.host cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}

/// protocols.io API configuration.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// API root, e.g. `https://www.protocols.io/api`.
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// Client access token sent as a bearer credential.
    #[serde(default)]
    pub access_token: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// Creates an API configuration with the default timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Overrides the request timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(default_api_url(), String::new())
    }
}

// Hand-written so the token never ends up in logs.
impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.access_token.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &token)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// How the MCP server talks to its client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Newline-delimited JSON-RPC over stdin/stdout.
    #[default]
    Stdio,
    /// Newline-delimited JSON-RPC over TCP, one session per connection.
    Tcp,
}

/// MCP transport configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Transport selected when the CLI does not override it.
    #[serde(default)]
    pub transport: TransportKind,

    /// Listen address for the TCP transport.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port for the TCP transport.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8000
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
