//! Configuration validation rules.

use thiserror::Error;

use crate::config::{AppConfig, MAX_TARGET_CONCURRENCY, is_allowed_interval};

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a value is empty, zero where a
    /// positive count is required, outside timeout bounds, or if the initial
    /// interval is not in the allowed set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "base_url".into(), reason: "must not be empty".into() });
        }
        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if !is_allowed_interval(self.min_interval) {
            return Err(ConfigError::Invalid {
                field: "min_interval".into(),
                reason: "must be one of the allowed intervals".into(),
            });
        }

        if self.max_batch_ids == 0 {
            return Err(ConfigError::Invalid { field: "max_batch_ids".into(), reason: "must be at least 1".into() });
        }
        if self.max_range_items == 0 {
            return Err(ConfigError::Invalid { field: "max_range_items".into(), reason: "must be at least 1".into() });
        }
        if self.save_every_n == 0 {
            return Err(ConfigError::Invalid { field: "save_every_n".into(), reason: "must be at least 1".into() });
        }
        if self.watchword.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "watchword".into(), reason: "must not be empty".into() });
        }

        if self.concurrency > MAX_TARGET_CONCURRENCY {
            tracing::warn!(
                requested = self.concurrency,
                ceiling = MAX_TARGET_CONCURRENCY,
                "concurrency exceeds the safety ceiling; it will be clamped"
            );
        }

        Ok(())
    }
}
