use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

use crate::grammar::DEFAULT_DATE_FORMAT;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Builder configuration with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Default page size for `paginate` / `simple_paginate`
    #[validate(range(
        min = 1,
        max = 10000,
        message = "Page size must be between 1 and 10000"
    ))]
    pub per_page: u32,

    /// Prefix binding keys with the target labels on every `from`
    pub prefix_bindings: bool,

    /// chrono format string used for date/time values
    #[validate(length(min = 1, message = "Date format cannot be empty"))]
    pub date_format: String,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            per_page: 15,
            prefix_bindings: false,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl BuilderConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            per_page: parse_env_var("NEOQUERY_PER_PAGE", "15")?,
            prefix_bindings: parse_env_var("NEOQUERY_PREFIX_BINDINGS", "false")?,
            date_format: env::var("NEOQUERY_DATE_FORMAT")
                .unwrap_or_else(|_| DEFAULT_DATE_FORMAT.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
