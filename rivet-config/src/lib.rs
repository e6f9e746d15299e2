// Configuration management for Rivet applications
//
// Settings come from a TOML or JSON file, from `RIVET_*` environment
// variables (optionally seeded from a `.env` file), or both; environment
// values override file values.

pub mod env;
pub mod error;
pub mod loader;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};

use rivet_core::ServerOptions;
use rivet_core::logging::{LogConfig, LogFormat, LogLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Prefix of the environment variables read by [`RivetConfig::from_env`]
pub const ENV_PREFIX: &str = "RIVET";

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Maximum request body size in bytes for `POST`/`PUT` routes
    pub body_limit: Option<usize>,
}

impl Default for ServerSection {
    fn default() -> Self {
        let options = ServerOptions::default();
        Self {
            host: options.host,
            port: options.port,
            body_limit: options.body_limit,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
    /// `json`, `plain`, `pretty` or `compact`
    pub format: String,
    /// Filter directives, e.g. `rivet_core=debug`
    pub filter: Option<String>,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
            filter: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RivetConfig {
    pub server: ServerSection,
    pub log: LogSection,
}

impl RivetConfig {
    /// Parse a configuration document
    pub fn parse(content: &str, format: FileFormat) -> Result<Self> {
        Self::from_value(ConfigLoader::new(format).parse(content)?)
    }

    /// Load a `.toml` or `.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::from_value(ConfigLoader::auto(path)?.load_file(path)?)
    }

    fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Defaults overridden by `RIVET_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env()
    }

    /// Apply `RIVET_*` environment overrides on top of this configuration
    pub fn merge_env(mut self) -> Result<Self> {
        self.apply_env(&EnvLoader::default().load())?;
        Ok(self)
    }

    /// Read a `.env` file into the environment, then [`from_env`](Self::from_env).
    ///
    /// Without a path, a missing `.env` in the working directory is ignored.
    pub fn load_dotenv(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Self::from_env()
    }

    /// Override settings from prefix-stripped, lowercased variables such as
    /// `server_port` or `log_level`. Unknown keys are ignored.
    pub fn apply_env(&mut self, vars: &HashMap<String, String>) -> Result<()> {
        if let Some(host) = vars.get("server_host") {
            self.server.host = host.clone();
        }
        if let Some(port) = vars.get("server_port") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("server_port", e))?;
        }
        if let Some(limit) = vars.get("server_body_limit") {
            let limit = limit.trim();
            self.server.body_limit = if limit.is_empty() {
                None
            } else {
                Some(
                    limit
                        .parse()
                        .map_err(|e| ConfigError::invalid("server_body_limit", e))?,
                )
            };
        }
        if let Some(level) = vars.get("log_level") {
            self.log.level = level.clone();
        }
        if let Some(format) = vars.get("log_format") {
            self.log.format = format.clone();
        }
        if let Some(filter) = vars.get("log_filter") {
            self.log.filter = Some(filter.clone());
        }
        Ok(())
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            host: self.server.host.clone(),
            port: self.server.port,
            body_limit: self.server.body_limit,
        }
    }

    /// Logging configuration; fails on an unknown level or format.
    pub fn log_config(&self) -> Result<LogConfig> {
        let level: LogLevel = self
            .log
            .level
            .parse()
            .map_err(|e| ConfigError::invalid("log.level", e))?;
        let format: LogFormat = self
            .log
            .format
            .parse()
            .map_err(|e| ConfigError::invalid("log.format", e))?;

        let config = LogConfig::new().level(level).format(format);
        Ok(match &self.log.filter {
            Some(filter) => config.with_env_filter(filter.clone()),
            None => config,
        })
    }
}
