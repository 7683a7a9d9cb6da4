//! Configuration error types.

use thiserror::Error;

/// Result type alias for configuration loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating exporter configuration.
///
/// All of these are fatal at startup. A malformed target list discovered at
/// runtime is reported through the same type so collectors can tell it apart
/// from transient failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid target {entry:?}: {reason}")]
    InvalidTarget { entry: String, reason: String },

    #[error("unknown metric family: {0}")]
    UnknownFamily(String),

    #[error("metric family configured twice: {0}")]
    DuplicateFamily(String),

    #[error("invalid duration {value:?} for {field}")]
    InvalidDuration { field: String, value: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}
