//! Dispatcher configuration
//!
//! Loaded from TOML or from `HERALD_*` environment variables:
//!
//! ```toml
//! enable_logging = true
//! catch_panics = true
//! primary_code = "highest"
//! ```

use crate::error::{ConfigError, PrimaryCodePolicy};
use serde::{Deserialize, Serialize};
use std::env;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "HERALD";

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Emit dispatch logs
    pub enable_logging: bool,

    /// Record handler panics as failures instead of unwinding through publish
    pub catch_panics: bool,

    /// How an aggregate failure selects its primary error code
    pub primary_code: PrimaryCodePolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enable_logging: true,
            catch_panics: true,
            primary_code: PrimaryCodePolicy::None,
        }
    }
}

impl DispatcherConfig {
    /// Parse configuration from a TOML document; missing keys keep defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(env::vars())
    }

    /// Load configuration from `(key, value)` pairs using the `HERALD_` prefix.
    ///
    /// Unrelated keys are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();

        for (key, value) in vars {
            let Some(name) = key
                .as_ref()
                .strip_prefix(ENV_PREFIX)
                .and_then(|rest| rest.strip_prefix('_'))
            else {
                continue;
            };
            let value = value.as_ref();

            match name {
                "ENABLE_LOGGING" => config.enable_logging = parse_bool(name, value)?,
                "CATCH_PANICS" => config.catch_panics = parse_bool(name, value)?,
                "PRIMARY_CODE" => config.primary_code = value.parse()?,
                _ => {}
            }
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_lowercase(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::default();

        assert!(config.enable_logging);
        assert!(config.catch_panics);
        assert_eq!(config.primary_code, PrimaryCodePolicy::None);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = DispatcherConfig::from_toml_str("primary_code = \"highest\"").unwrap();

        assert_eq!(config.primary_code, PrimaryCodePolicy::Highest);
        assert!(config.enable_logging);
    }

    #[test]
    fn test_from_toml_invalid() {
        let result = DispatcherConfig::from_toml_str("primary_code = \"worst\"");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_from_vars() {
        let config = DispatcherConfig::from_vars([
            ("HERALD_ENABLE_LOGGING", "false"),
            ("HERALD_CATCH_PANICS", "0"),
            ("HERALD_PRIMARY_CODE", "first"),
            ("HERALDRY", "ignored"),
            ("PATH", "/usr/bin"),
        ])
        .unwrap();

        assert!(!config.enable_logging);
        assert!(!config.catch_panics);
        assert_eq!(config.primary_code, PrimaryCodePolicy::First);
    }

    #[test]
    fn test_from_vars_rejects_bad_bool() {
        let result = DispatcherConfig::from_vars([("HERALD_CATCH_PANICS", "maybe")]);

        match result {
            Err(ConfigError::InvalidValue { key, value }) => {
                assert_eq!(key, "catch_panics");
                assert_eq!(value, "maybe");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
