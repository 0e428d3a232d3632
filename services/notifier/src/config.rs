//! Sweep schedules (`NOTIFIER_*` variables)
//!
//! Schedules use the six-field cron format with a leading seconds column.

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NotifierConfig {
    /// `NOTIFIER_DELIVER_SCHEDULE` (default: every 5 minutes)
    pub deliver_schedule: String,
    /// `NOTIFIER_ORPHAN_SCHEDULE` (default: hourly)
    pub orphan_schedule: String,
    /// `NOTIFIER_PURGE_SCHEDULE` (default: daily at 03:30)
    pub purge_schedule: String,
    /// `NOTIFIER_RETENTION_DAYS`: read notifications older than this are purged
    pub retention_days: i64,
}

impl NotifierConfig {
    pub fn from_env() -> Result<Self> {
        let settings = Config::builder()
            .set_default("deliver_schedule", "0 0/5 * * * *")?
            .set_default("orphan_schedule", "0 0 * * * *")?
            .set_default("purge_schedule", "0 30 3 * * *")?
            .set_default("retention_days", 30_i64)?
            .add_source(Environment::with_prefix("NOTIFIER").try_parsing(true))
            .build()?;

        let config: NotifierConfig = settings.try_deserialize()?;
        if config.retention_days < 1 {
            anyhow::bail!("NOTIFIER_RETENTION_DAYS must be at least 1");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        unsafe {
            for key in [
                "NOTIFIER_DELIVER_SCHEDULE",
                "NOTIFIER_ORPHAN_SCHEDULE",
                "NOTIFIER_PURGE_SCHEDULE",
                "NOTIFIER_RETENTION_DAYS",
            ] {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();
        let config = NotifierConfig::from_env().unwrap();
        assert_eq!(config.deliver_schedule, "0 0/5 * * * *");
        assert_eq!(config.retention_days, 30);
    }

    #[test]
    #[serial]
    fn test_overrides_and_bounds() {
        clear();
        unsafe {
            std::env::set_var("NOTIFIER_RETENTION_DAYS", "7");
            std::env::set_var("NOTIFIER_PURGE_SCHEDULE", "0 0 4 * * *");
        }
        let config = NotifierConfig::from_env().unwrap();
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.purge_schedule, "0 0 4 * * *");

        unsafe {
            std::env::set_var("NOTIFIER_RETENTION_DAYS", "0");
        }
        assert!(NotifierConfig::from_env().is_err());
        clear();
    }
}
