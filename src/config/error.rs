//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Request body limit must be between 1 byte and 4 MiB")]
    InvalidBodyLimit,

    #[error("Invalid bind address: {0}")]
    InvalidSocketAddr(String),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Reconnect base delay must be positive and not exceed max delay")]
    InvalidReconnectDelays,

    #[error("Store write timeout must be positive")]
    InvalidWriteTimeout,

    #[error("Store ready and write timeouts must fit inside the request timeout")]
    StoreDeadlineExceedsRequestTimeout,

    #[error("Invalid payment provider URL")]
    InvalidProviderUrl,

    #[error("Signature header name must not be empty")]
    InvalidSignatureHeader,

    #[error("Invalid buffer setting: {0}")]
    InvalidBufferSetting(&'static str),
}
