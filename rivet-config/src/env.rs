// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Reads configuration keys from environment variables.
///
/// With a prefix, only variables named `<PREFIX>_<KEY>` are considered and
/// the prefix is stripped. Keys are lowercased, so `RIVET_SERVER_PORT`
/// becomes `server_port`.
#[derive(Debug, Clone)]
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load every matching variable of the process environment
    pub fn load(&self) -> HashMap<String, String> {
        self.collect(env::vars())
    }

    /// Filter and normalize an arbitrary set of variables.
    pub fn collect<I>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter_map(|(key, value)| match &self.prefix {
                Some(prefix) => key
                    .strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| (rest.to_lowercase(), value)),
                None => Some((key.to_lowercase(), value)),
            })
            .collect()
    }

    /// Load a single variable, applying the prefix
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        };

        env::var(&full_key).map_err(ConfigError::EnvError)
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(Some(crate::ENV_PREFIX.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_prefix_is_stripped() {
        let loader = EnvLoader::default();
        let loaded = loader.collect(vars(&[
            ("RIVET_SERVER_PORT", "9000"),
            ("RIVETING", "no"),
            ("PATH", "/bin"),
        ]));

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("server_port").map(String::as_str), Some("9000"));
    }

    #[test]
    fn test_without_prefix() {
        let loader = EnvLoader::new(None);
        let loaded = loader.collect(vars(&[("LOG_LEVEL", "debug")]));
        assert_eq!(loaded.get("log_level").map(String::as_str), Some("debug"));
    }

    #[test]
    fn test_missing_var_uses_default() {
        let loader = EnvLoader::new(Some("RIVET_TEST".to_string()));
        assert!(loader.load_var("MISSING_VAR_67890").is_err());
        assert_eq!(loader.load_var_or("MISSING_VAR_67890", "fallback"), "fallback");
    }
}
