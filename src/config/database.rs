//! Backing store connection, pool sizing and reconnect cadence.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// URL that selects the in-memory store instead of PostgreSQL.
pub const MEMORY_URL: &str = "memory://";

/// Store settings shared by the PostgreSQL adapter and the connection guardian.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL, or `memory://`
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Seconds a query waits for a pooled connection
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// First reconnect delay in milliseconds
    #[serde(default = "default_reconnect_base_delay")]
    pub reconnect_base_delay_ms: u64,

    /// Reconnect delay ceiling in milliseconds
    #[serde(default = "default_reconnect_max_delay")]
    pub reconnect_max_delay_ms: u64,

    /// Interval between background health checks in seconds
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// How long a webhook request waits for the store before buffering
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_ms: u64,

    /// How long applying one event may take before it is buffered instead
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,

    /// Exit at startup if the store cannot be reached
    #[serde(default)]
    pub fail_fast_on_startup: bool,
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url == MEMORY_URL
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Worst case a webhook request spends on the store.
    pub fn store_deadline(&self) -> Duration {
        self.ready_timeout() + self.write_timeout()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("DATABASE__URL"));
        }
        if !self.is_memory()
            && !self.url.starts_with("postgres://")
            && !self.url.starts_with("postgresql://")
        {
            return Err(ValidationError::InvalidDatabaseUrl);
        }
        if self.min_connections > self.max_connections {
            return Err(ValidationError::InvalidPoolSize);
        }
        if self.max_connections > 100 {
            return Err(ValidationError::PoolSizeTooLarge);
        }
        if self.reconnect_base_delay_ms == 0
            || self.reconnect_base_delay_ms > self.reconnect_max_delay_ms
        {
            return Err(ValidationError::InvalidReconnectDelays);
        }
        if self.health_check_interval_secs == 0 {
            return Err(ValidationError::MissingRequired("DATABASE__HEALTH_CHECK_INTERVAL_SECS"));
        }
        if self.write_timeout_ms == 0 {
            return Err(ValidationError::InvalidWriteTimeout);
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            reconnect_base_delay_ms: default_reconnect_base_delay(),
            reconnect_max_delay_ms: default_reconnect_max_delay(),
            health_check_interval_secs: default_health_check_interval(),
            ready_timeout_ms: default_ready_timeout(),
            write_timeout_ms: default_write_timeout(),
            fail_fast_on_startup: false,
        }
    }
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    5
}

fn default_reconnect_base_delay() -> u64 {
    1_000
}

fn default_reconnect_max_delay() -> u64 {
    60_000
}

fn default_health_check_interval() -> u64 {
    30
}

fn default_ready_timeout() -> u64 {
    1_500
}

fn default_write_timeout() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> DatabaseConfig {
        DatabaseConfig {
            url: "postgresql://test@localhost/test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn reconnect_defaults_back_off_from_one_second_to_one_minute() {
        let config = DatabaseConfig::default();
        assert_eq!(config.reconnect_base_delay(), Duration::from_secs(1));
        assert_eq!(config.reconnect_max_delay(), Duration::from_secs(60));
        assert_eq!(config.health_check_interval(), Duration::from_secs(30));
        assert_eq!(config.ready_timeout(), Duration::from_millis(1500));
        assert_eq!(config.write_timeout(), Duration::from_secs(5));
        assert_eq!(config.store_deadline(), Duration::from_millis(6500));
        assert!(!config.fail_fast_on_startup);
    }

    #[test]
    fn zero_write_timeout_is_rejected() {
        let config = DatabaseConfig {
            write_timeout_ms: 0,
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidWriteTimeout));
    }

    #[test]
    fn postgres_url_is_accepted() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn memory_url_selects_in_memory_store() {
        let config = DatabaseConfig {
            url: MEMORY_URL.to_string(),
            ..Default::default()
        };
        assert!(config.is_memory());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_url_is_missing() {
        assert_eq!(
            DatabaseConfig::default().validate(),
            Err(ValidationError::MissingRequired("DATABASE__URL"))
        );
    }

    #[test]
    fn foreign_scheme_is_rejected() {
        let config = DatabaseConfig {
            url: "mysql://localhost/db".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidDatabaseUrl));
    }

    #[test]
    fn pool_bounds_are_checked() {
        let config = DatabaseConfig {
            min_connections: 20,
            max_connections: 10,
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidPoolSize));

        let config = DatabaseConfig {
            max_connections: 150,
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::PoolSizeTooLarge));
    }

    #[test]
    fn base_delay_above_ceiling_is_rejected() {
        let config = DatabaseConfig {
            reconnect_base_delay_ms: 120_000,
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidReconnectDelays));
    }
}
