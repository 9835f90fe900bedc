//! Test client configuration.
//!
//! Configuration is applied in layers, later layers overriding earlier
//! ones:
//!
//! 1. Default values
//! 2. A TOML document ([`ConfigLoader::with_file`] or
//!    [`ConfigLoader::with_string`])
//! 3. Environment variables `PREFIX__FIELD` ([`ConfigLoader::with_env_prefix`])
//!
//! ```no_run
//! use sextant_test::ConfigLoader;
//!
//! # fn main() -> Result<(), sextant_test::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("testclient.toml")?
//!     .with_env_prefix("SEXTANT_TEST")
//!     .load()?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use http::Uri;
use serde::Deserialize;
use thiserror::Error;

/// Default base URL of test requests.
pub const DEFAULT_BASE_URL: &str = "http://testserver";

/// Default capacity of the per-exchange event channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Errors raised while loading client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Failed to read a configuration file.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Invalid configuration value.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// The field with the invalid value.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// Environment variable parsing error.
    #[error("failed to parse environment variable {var}: {reason}")]
    EnvParseError {
        /// The environment variable name.
        var: String,
        /// Why parsing failed.
        reason: String,
    },
}

impl ConfigError {
    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an environment variable parse error.
    pub fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }
}

/// Settings of a [`TestClient`](crate::TestClient).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestClientConfig {
    /// Base URL relative request paths are resolved against.
    pub base_url: String,
    /// Prefix under which the application is mounted.
    pub root_path: String,
    /// Return application errors from `send` instead of a 500 response.
    pub raise_server_exceptions: bool,
    /// Capacity of the per-exchange event channels.
    pub channel_capacity: usize,
    /// Headers added to every request.
    pub default_headers: BTreeMap<String, String>,
}

impl Default for TestClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            root_path: String::new(),
            raise_server_exceptions: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            default_headers: BTreeMap::new(),
        }
    }
}

impl TestClientConfig {
    /// Parse a TOML document. Missing fields keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigLoader::new().with_file(path)?.load()
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let uri: Uri = self
            .base_url
            .parse()
            .map_err(|e| ConfigError::invalid_value("base_url", format!("{e}")))?;
        match uri.scheme_str() {
            Some("http" | "https") => {}
            _ => {
                return Err(ConfigError::invalid_value(
                    "base_url",
                    "scheme must be http or https",
                ))
            }
        }
        if uri.host().is_none() {
            return Err(ConfigError::invalid_value("base_url", "missing host"));
        }

        if !self.root_path.is_empty() && !self.root_path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "root_path",
                "must be empty or start with '/'",
            ));
        }

        if self.channel_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "channel_capacity",
                "must be greater than zero",
            ));
        }

        for (name, value) in &self.default_headers {
            if http::HeaderName::try_from(name.as_str()).is_err() {
                return Err(ConfigError::invalid_value(
                    format!("default_headers.{name}"),
                    "invalid header name",
                ));
            }
            if http::HeaderValue::try_from(value.as_str()).is_err() {
                return Err(ConfigError::invalid_value(
                    format!("default_headers.{name}"),
                    "invalid header value",
                ));
            }
        }

        Ok(())
    }
}

/// Layered loader for [`TestClientConfig`].
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: TestClientConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Start from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TOML file.
    pub fn with_file(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.with_string(&content)
    }

    /// Load a TOML file if it exists.
    pub fn with_optional_file(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load a TOML document.
    pub fn with_string(mut self, content: &str) -> Result<Self, ConfigError> {
        self.config = toml::from_str(content)?;
        Ok(self)
    }

    /// Apply `PREFIX__FIELD` environment overrides on [`load`](Self::load).
    ///
    /// With prefix `SEXTANT_TEST`:
    /// - `SEXTANT_TEST__BASE_URL=https://example.org`
    /// - `SEXTANT_TEST__RAISE_SERVER_EXCEPTIONS=false`
    /// - `SEXTANT_TEST__DEFAULT_HEADERS__X_TENANT=acme` (underscores become dashes)
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Apply environment overrides and validate.
    pub fn load(mut self) -> Result<TestClientConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: Vec<(String, String)> = env::vars()
                .filter(|(key, _)| key.starts_with(&prefix))
                .collect();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }
        self.config.validate()?;
        Ok(self.config)
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(field) = key
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix("__"))
        else {
            return Ok(());
        };

        let parts: Vec<&str> = field.split("__").collect();
        match parts.as_slice() {
            ["BASE_URL"] => self.config.base_url = value.to_string(),
            ["ROOT_PATH"] => self.config.root_path = value.to_string(),
            ["RAISE_SERVER_EXCEPTIONS"] => {
                self.config.raise_server_exceptions = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["CHANNEL_CAPACITY"] => {
                self.config.channel_capacity = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
            }
            ["DEFAULT_HEADERS", name] => {
                let name = name.to_lowercase().replace('_', "-");
                self.config.default_headers.insert(name, value.to_string());
            }
            _ => {
                tracing::debug!(var = %key, "Ignoring unknown configuration variable");
            }
        }
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
