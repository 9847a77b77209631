//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::mcp::server::MAX_CONCURRENT_LIMIT;
use crate::vat::http::{HttpApiConfig, DEFAULT_BASE_URL};

/// Log levels accepted in `logging.level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

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

    /// VAT API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Server loop settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.backend == Backend::Http
            && !(self.api.base_url.starts_with("http://")
                || self.api.base_url.starts_with("https://"))
        {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid api.base_url '{}'. Must start with http:// or https://",
                    self.api.base_url
                ),
            });
        }

        if self.api.timeout_secs == 0 || self.api.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "api.timeout_secs and api.connect_timeout_secs must be positive"
                    .to_string(),
            });
        }

        let max = self.server.max_concurrent_requests;
        if !(1..=MAX_CONCURRENT_LIMIT).contains(&max) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid server.max_concurrent_requests {max}. Must be between 1 and {MAX_CONCURRENT_LIMIT}"
                ),
            });
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid logging.level '{}'. Must be one of: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }

        Ok(())
    }
}

/// Where VAT data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The tax agency REST API.
    #[default]
    Http,
    /// An in-process store, empty at startup.
    Memory,
}

/// VAT API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Data source. Default: `http`
    #[serde(default)]
    pub backend: Backend,

    /// Base URL of the REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout in seconds. Default: 30
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds. Default: 5
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl ApiConfig {
    /// Returns the HTTP client settings.
    #[must_use]
    pub fn http(&self) -> HttpApiConfig {
        HttpApiConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_connect_timeout_secs() -> u64 {
    5
}

/// Server loop configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Messages handled at once. `1` answers strictly in order.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

const fn default_max_concurrent_requests() -> usize {
    1
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
