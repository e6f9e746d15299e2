// Configuration file loading

use crate::{ConfigError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }
}

/// Reads a configuration document into a JSON value tree.
#[derive(Debug, Clone, Copy)]
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Pick the format from the file extension
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::LoadError(format!("{} has no file extension", path.display())))?;

        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| ConfigError::LoadError(format!("Unsupported format: {}", ext)))?;

        Ok(Self::new(format))
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let content = fs::read_to_string(path)?;
        self.parse(&content)
    }

    pub fn parse(&self, content: &str) -> Result<Value> {
        match self.format {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e))),
            FileFormat::Toml => {
                let value: toml::Value = toml::from_str(content)
                    .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;
                serde_json::to_value(value)
                    .map_err(|e| ConfigError::ParseError(format!("TOML conversion error: {}", e)))
            }
        }
    }
}
