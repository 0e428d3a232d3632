//! Notification and scheduled notification repository
//!
//! The sweep helpers at the bottom are driven by the notifier service.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::{
    metadata::MetadataError,
    models::notification::{
        NewScheduledNotification, Notification, Recurrence, ScheduledNotification,
        UpdateScheduledNotification,
    },
};

const DEFAULT_LIMIT: i64 = 50;

/// Notification repository
#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Create a new notification repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_user(&self, user_id: i32, unread_only: bool, limit: Option<i64>) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 500))
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    pub async fn unread_count(&self, user_id: i32) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn mark_read(&self, id: i32, user_id: i32) -> Result<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_read(&self, user_id: i32) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete(&self, id: i32, user_id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_scheduled(&self, user_id: i32) -> Result<Vec<ScheduledNotification>> {
        let rows = sqlx::query_as::<_, ScheduledNotification>(
            "SELECT * FROM scheduled_notifications WHERE user_id = $1 ORDER BY scheduled_for, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn find_scheduled(&self, id: i32) -> Result<Option<ScheduledNotification>> {
        let row = sqlx::query_as::<_, ScheduledNotification>(
            "SELECT * FROM scheduled_notifications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn create_scheduled(&self, user_id: i32, new: &NewScheduledNotification) -> Result<ScheduledNotification> {
        if new.title.trim().is_empty() {
            return Err(MetadataError::invalid("Title cannot be empty").into());
        }

        let row = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            INSERT INTO scheduled_notifications
                (user_id, table_id, record_id, title, message, scheduled_for, recurs_from, recurrence)
            VALUES ($1, $2, $3, $4, $5, $6, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(new.table_id)
        .bind(new.record_id)
        .bind(new.title.trim())
        .bind(&new.message)
        .bind(new.scheduled_for)
        .bind(new.recurrence.as_str())
        .fetch_one(&self.pool)
        .await?;

        info!(scheduled_id = row.id, user_id, "Scheduled notification");
        Ok(row)
    }

    pub async fn update_scheduled(&self, id: i32, changes: &UpdateScheduledNotification) -> Result<Option<ScheduledNotification>> {
        let row = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            UPDATE scheduled_notifications
            SET title = COALESCE($2, title),
                message = COALESCE($3, message),
                scheduled_for = COALESCE($4, scheduled_for),
                recurs_from = COALESCE($4, recurs_from),
                recurrence = COALESCE($5, recurrence),
                is_active = COALESCE($6, is_active),
                is_sent = CASE WHEN $4 IS NULL THEN is_sent ELSE FALSE END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.message)
        .bind(changes.scheduled_for)
        .bind(changes.recurrence.map(|r| r.as_str()))
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn delete_scheduled(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scheduled_notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deliver every scheduled notification due at `now`.
    ///
    /// One-shot schedules are marked sent; recurring ones move to their next
    /// occurrence. Rows are claimed with `SKIP LOCKED` so concurrent sweeps
    /// never deliver twice.
    pub async fn deliver_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let due = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            SELECT * FROM scheduled_notifications
            WHERE is_active AND NOT is_sent AND scheduled_for <= $1
            ORDER BY scheduled_for, id
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        for scheduled in &due {
            sqlx::query(
                r#"
                INSERT INTO notifications (user_id, title, message, table_id, record_id)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(scheduled.user_id)
            .bind(&scheduled.title)
            .bind(&scheduled.message)
            .bind(scheduled.table_id)
            .bind(scheduled.record_id)
            .execute(&mut *tx)
            .await?;

            let recurrence = scheduled.recurrence.parse::<Recurrence>().unwrap_or_else(|e| {
                warn!(scheduled_id = scheduled.id, "{}; treating as one-shot", e);
                Recurrence::None
            });

            match recurrence.next_after(scheduled.recurs_from, now) {
                Some(next) => {
                    sqlx::query("UPDATE scheduled_notifications SET scheduled_for = $2 WHERE id = $1")
                        .bind(scheduled.id)
                        .bind(next)
                        .execute(&mut *tx)
                        .await?;
                }
                None => {
                    sqlx::query("UPDATE scheduled_notifications SET is_sent = TRUE WHERE id = $1")
                        .bind(scheduled.id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(due.len())
    }

    /// Deactivate schedules whose record no longer exists
    pub async fn deactivate_orphaned(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_notifications s
            SET is_active = FALSE
            WHERE s.is_active
              AND s.record_id IS NOT NULL
              AND NOT EXISTS (SELECT 1 FROM records r WHERE r.id = s.record_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete read notifications created before `cutoff`
    pub async fn purge_read_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE is_read AND created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
