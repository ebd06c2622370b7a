//! Error types for redis-smoke-core

use thiserror::Error;

/// Result type alias using redis-smoke-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Required environment variable is unset or empty
    #[error("Environment variable {name} is not set")]
    MissingEnv { name: String },

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid config error from a list of problems
    pub fn invalid_config_list(problems: Vec<String>) -> Self {
        Self::InvalidConfig {
            message: problems.join("; "),
        }
    }

    /// Create a missing environment variable error
    pub fn missing_env(name: impl Into<String>) -> Self {
        Self::MissingEnv { name: name.into() }
    }
}
