//! Configuration management for the order match engine
//!
//! Supports loading configuration from:
//! - TOML/YAML files (config/default, config/{environment})
//! - Environment variables (ORDER_MATCH__ prefix)
//! - Runtime overrides
//!
//! Score weights and decision thresholds are heuristic defaults, not
//! domain laws; every value in [`Settings`] can be overridden per
//! deployment.

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, DistanceMetric, KeywordIndexSettings, MatchingConfig, RerankerSettings,
    RuntimeEnvironment, Settings, VectorStoreSettings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
