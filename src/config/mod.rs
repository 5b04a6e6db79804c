//! Typed settings read from `SUBSCRIPTION_GATE__*` environment variables.
//!
//! Sections nest with `__`, so `SUBSCRIPTION_GATE__BUFFER__CAPACITY=500`
//! sets `buffer.capacity`. A `.env` file is honoured for local runs.
//! [`AppConfig::validate`] runs once at startup before anything connects.

mod buffer;
mod database;
mod error;
mod payment;
mod server;

pub use buffer::BufferConfig;
pub use database::{DatabaseConfig, MEMORY_URL};
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// All runtime settings, one field per section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP listener and log format
    #[serde(default)]
    pub server: ServerConfig,

    /// Backing store connection and reconnect policy
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Payment provider (webhook secret, lookup API)
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Durable buffer and idempotency snapshot settings
    #[serde(default)]
    pub buffer: BufferConfig,
}

impl AppConfig {
    /// Reads `.env` (if any) and the process environment.
    ///
    /// Missing sections fall back to their defaults; only values that fail to
    /// parse are errors here. Semantic checks live in [`AppConfig::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SUBSCRIPTION_GATE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// First failing section wins.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate(self.is_production())?;
        self.buffer.validate()?;
        if self.database.store_deadline() >= self.server.request_timeout() {
            return Err(ValidationError::StoreDeadlineExceedsRequestTimeout);
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
