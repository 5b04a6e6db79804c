//! Durable buffer and idempotency configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ValidationError;

/// Longest retention accepted for buffered events (90 days).
const MAX_AGE_HOURS_LIMIT: i64 = 24 * 90;

/// Buffer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BufferConfig {
    /// Directory holding the snapshot files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum buffered events before the oldest are evicted
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Buffered events older than this are dropped
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: i64,

    /// Failed drain attempts before an event is frozen
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Interval between drain passes in seconds
    #[serde(default = "default_drain_interval")]
    pub drain_interval_secs: u64,

    /// Maximum remembered processed fingerprints
    #[serde(default = "default_idempotency_capacity")]
    pub idempotency_capacity: usize,

    /// Interval between idempotency snapshots in seconds
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,
}

impl BufferConfig {
    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }

    /// Validate buffer configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ValidationError::MissingRequired("BUFFER__DATA_DIR"));
        }
        if self.capacity == 0 {
            return Err(ValidationError::InvalidBufferSetting("capacity must be positive"));
        }
        if self.max_age_hours <= 0 {
            return Err(ValidationError::InvalidBufferSetting("max_age_hours must be positive"));
        }
        if self.max_age_hours > MAX_AGE_HOURS_LIMIT {
            return Err(ValidationError::InvalidBufferSetting(
                "max_age_hours must not exceed 2160",
            ));
        }
        if self.max_retries == 0 {
            return Err(ValidationError::InvalidBufferSetting("max_retries must be positive"));
        }
        if self.drain_interval_secs == 0 || self.snapshot_interval_secs == 0 {
            return Err(ValidationError::InvalidBufferSetting("intervals must be positive"));
        }
        if self.idempotency_capacity == 0 {
            return Err(ValidationError::InvalidBufferSetting(
                "idempotency_capacity must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            capacity: default_capacity(),
            max_age_hours: default_max_age_hours(),
            max_retries: default_max_retries(),
            drain_interval_secs: default_drain_interval(),
            idempotency_capacity: default_idempotency_capacity(),
            snapshot_interval_secs: default_snapshot_interval(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/webhook-buffer")
}

fn default_capacity() -> usize {
    1_000
}

fn default_max_age_hours() -> i64 {
    48
}

fn default_max_retries() -> u32 {
    5
}

fn default_drain_interval() -> u64 {
    30
}

fn default_idempotency_capacity() -> usize {
    10_000
}

fn default_snapshot_interval() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BufferConfig::default();
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.max_age_hours, 48);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.drain_interval(), Duration::from_secs(30));
        assert_eq!(config.idempotency_capacity, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = BufferConfig {
            capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidBufferSetting(_))
        ));
    }

    #[test]
    fn test_unbounded_max_age_rejected() {
        let config = BufferConfig {
            max_age_hours: i64::MAX,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidBufferSetting(
                "max_age_hours must not exceed 2160"
            ))
        );

        let config = BufferConfig {
            max_age_hours: MAX_AGE_HOURS_LIMIT,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_retries_rejected() {
        let config = BufferConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
