// Error types for configuration loading

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvError(#[from] std::env::VarError),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl ToString) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
