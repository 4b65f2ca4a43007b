//! Configuration error types.

use thiserror::Error;

/// Result type alias for configuration loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating scheduler configuration.
///
/// All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("task requirement `{name}` declares no resources")]
    NoResources { name: String },

    #[error("task requirement `{name}` has invalid amount {amount} for resource `{resource}`")]
    InvalidResource {
        name: String,
        resource: String,
        amount: f64,
    },

    #[error("task name must not be empty")]
    EmptyName,
}
