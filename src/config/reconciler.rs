//! Reconciler timeouts and webhook bookkeeping

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Timeouts for outbound calls plus processed-webhook retention.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_secs: u64,

    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,

    #[serde(default = "default_notifier_timeout")]
    pub notifier_timeout_secs: u64,

    /// How long processed webhook ids are kept for deduplication
    #[serde(default = "default_retention_days")]
    pub webhook_retention_days: u32,

    /// How often the purge task runs
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl ReconcilerConfig {
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn notifier_timeout(&self) -> Duration {
        Duration::from_secs(self.notifier_timeout_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let settings = [
            (self.gateway_timeout_secs, "GATEWAY_TIMEOUT_SECS"),
            (self.store_timeout_secs, "STORE_TIMEOUT_SECS"),
            (self.notifier_timeout_secs, "NOTIFIER_TIMEOUT_SECS"),
            (u64::from(self.webhook_retention_days), "WEBHOOK_RETENTION_DAYS"),
            (self.purge_interval_secs, "PURGE_INTERVAL_SECS"),
        ];
        for (value, name) in settings {
            if value == 0 {
                return Err(ValidationError::InvalidReconcilerSetting(name));
            }
        }
        Ok(())
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            gateway_timeout_secs: default_gateway_timeout(),
            store_timeout_secs: default_store_timeout(),
            notifier_timeout_secs: default_notifier_timeout(),
            webhook_retention_days: default_retention_days(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

fn default_gateway_timeout() -> u64 {
    10
}

fn default_store_timeout() -> u64 {
    5
}

fn default_notifier_timeout() -> u64 {
    10
}

fn default_retention_days() -> u32 {
    30
}

fn default_purge_interval() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReconcilerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway_timeout(), Duration::from_secs(10));
        assert_eq!(config.store_timeout(), Duration::from_secs(5));
        assert_eq!(config.purge_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ReconcilerConfig {
            notifier_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidReconcilerSetting("NOTIFIER_TIMEOUT_SECS"))
        );
    }

    #[test]
    fn test_zero_retention_rejected() {
        let config = ReconcilerConfig {
            webhook_retention_days: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
