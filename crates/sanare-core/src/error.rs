//! Core error taxonomy for the Sanare verification pipeline.
//!
//! Each variant maps to a distinct caller outcome: configuration failures
//! are fatal and never retried, validation failures carry field detail,
//! rate limits carry a retry hint, and state conflicts signal that a
//! transition was attempted against a terminal or mismatched state.

use std::time::Duration;
use thiserror::Error;

/// Central error type for all Sanare operations.
#[derive(Error, Debug)]
pub enum SanareError {
    /// Configuration errors (missing/invalid credentials, bad config file)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed caller input, with field detail
    #[error("validation error on {field}: {reason}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Registry miss, unknown token, or expired/unknown provider session
    #[error("not found: {0}")]
    NotFound(String),

    /// Request rejected by a rate limit
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// How long the caller should wait before retrying
        retry_after: Duration,
    },

    /// External system failure (registry unreachable, provider non-2xx, parse failure)
    #[error("upstream failure from {source_name}: {detail}")]
    Upstream {
        /// Which external system failed
        source_name: String,
        /// Diagnostic detail (status code, body excerpt, parse error)
        detail: String,
    },

    /// Invalid state transition (double finalize, admin approve outside In Review)
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// Database errors (connection, queries, migrations)
    #[error("database error: {0}")]
    Database(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl SanareError {
    /// Shorthand for a validation error.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an upstream error.
    pub fn upstream(source_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Upstream {
            source_name: source_name.into(),
            detail: detail.into(),
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Required value missing (e.g. provider credentials)
    #[error("missing required config value: {field}")]
    Missing {
        /// Field name
        field: String,
    },

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `SanareError`.
pub type Result<T> = std::result::Result<T, SanareError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
