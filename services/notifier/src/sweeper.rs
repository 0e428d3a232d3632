//! Periodic notification sweeps

use anyhow::Result;
use api::repositories::NotificationRepository;
use chrono::{DateTime, Duration, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::NotifierConfig;

/// Cut-off before which read notifications are purged
pub fn retention_cutoff(now: DateTime<Utc>, retention_days: i64) -> DateTime<Utc> {
    now - Duration::days(retention_days)
}

#[derive(Clone)]
pub struct Sweeper {
    notifications: NotificationRepository,
    retention_days: i64,
}

impl Sweeper {
    pub fn new(notifications: NotificationRepository, retention_days: i64) -> Self {
        Self {
            notifications,
            retention_days,
        }
    }

    /// Deliver due scheduled notifications
    pub async fn deliver(&self) {
        match self.notifications.deliver_due(Utc::now()).await {
            Ok(0) => {}
            Ok(delivered) => info!("Delivered {} scheduled notifications", delivered),
            Err(e) => error!("Failed to deliver scheduled notifications: {:#}", e),
        }
    }

    /// Deactivate schedules whose record has been deleted
    pub async fn deactivate_orphans(&self) {
        match self.notifications.deactivate_orphaned().await {
            Ok(0) => {}
            Ok(count) => info!("Deactivated {} orphaned scheduled notifications", count),
            Err(e) => error!("Failed to deactivate orphaned schedules: {:#}", e),
        }
    }

    /// Drop read notifications past the retention window
    pub async fn purge_read(&self) {
        let cutoff = retention_cutoff(Utc::now(), self.retention_days);
        match self.notifications.purge_read_before(cutoff).await {
            Ok(count) => info!("Purged {} read notifications older than {}", count, cutoff),
            Err(e) => error!("Failed to purge read notifications: {:#}", e),
        }
    }

    /// Register the three sweeps and start the scheduler
    pub async fn start(&self, config: &NotifierConfig) -> Result<JobScheduler> {
        let scheduler = JobScheduler::new().await?;

        let sweeper = self.clone();
        scheduler
            .add(Job::new_async(config.deliver_schedule.as_str(), move |_, _| {
                let sweeper = sweeper.clone();
                Box::pin(async move { sweeper.deliver().await })
            })?)
            .await?;

        let sweeper = self.clone();
        scheduler
            .add(Job::new_async(config.orphan_schedule.as_str(), move |_, _| {
                let sweeper = sweeper.clone();
                Box::pin(async move { sweeper.deactivate_orphans().await })
            })?)
            .await?;

        let sweeper = self.clone();
        scheduler
            .add(Job::new_async(config.purge_schedule.as_str(), move |_, _| {
                let sweeper = sweeper.clone();
                Box::pin(async move { sweeper.purge_read().await })
            })?)
            .await?;

        scheduler.start().await?;
        info!(
            deliver = %config.deliver_schedule,
            orphans = %config.orphan_schedule,
            purge = %config.purge_schedule,
            "Started notification sweeps"
        );
        Ok(scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_retention_cutoff() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(
            retention_cutoff(now, 30),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
    }
}
