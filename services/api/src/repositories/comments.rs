//! Record comments and assigned users

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use crate::{
    metadata::MetadataError,
    models::comment::{AssignedUser, RecordComment},
};

/// Record comment and assignment repository
#[derive(Clone)]
pub struct CommentRepository {
    pool: PgPool,
}

impl CommentRepository {
    /// Create a new comment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, record_id: i32) -> Result<Vec<RecordComment>> {
        let comments = sqlx::query_as::<_, RecordComment>(
            r#"
            SELECT c.id, c.record_id, c.table_id, c.user_id, u.name AS user_name,
                   c.comment, c.created_at, c.updated_at
            FROM record_comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.record_id = $1
            ORDER BY c.created_at, c.id
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<RecordComment>> {
        let comment = sqlx::query_as::<_, RecordComment>(
            r#"
            SELECT c.id, c.record_id, c.table_id, c.user_id, u.name AS user_name,
                   c.comment, c.created_at, c.updated_at
            FROM record_comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    pub async fn create(&self, record_id: i32, user_id: i32, comment: &str) -> Result<RecordComment> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(MetadataError::invalid("Comment cannot be empty").into());
        }

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO record_comments (record_id, table_id, user_id, comment)
            SELECT id, table_id, $2, $3 FROM records WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(record_id)
        .bind(user_id)
        .bind(comment)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| MetadataError::not_found("Record"))?;

        info!(comment_id = id, record_id, "Added record comment");
        self.find_by_id(id)
            .await?
            .ok_or_else(|| MetadataError::not_found("Comment").into())
    }

    /// Only the author may edit a comment
    pub async fn update(&self, id: i32, user_id: i32, comment: &str) -> Result<Option<RecordComment>> {
        let updated = sqlx::query(
            "UPDATE record_comments SET comment = $3, updated_at = NOW() WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .bind(comment.trim())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    pub async fn delete(&self, id: i32, user_id: i32, is_admin: bool) -> Result<bool> {
        let result = sqlx::query("DELETE FROM record_comments WHERE id = $1 AND (user_id = $2 OR $3)")
            .bind(id)
            .bind(user_id)
            .bind(is_admin)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn assigned_users(&self, record_id: i32) -> Result<Vec<AssignedUser>> {
        let users = sqlx::query_as::<_, AssignedUser>(
            r#"
            SELECT a.record_id, a.user_id, u.name AS user_name, u.email AS user_email,
                   a.assigned_by, a.assigned_at
            FROM record_assigned_users a
            JOIN users u ON u.id = a.user_id
            WHERE a.record_id = $1
            ORDER BY a.assigned_at
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn assign_users(&self, record_id: i32, user_ids: &[i32], assigned_by: i32) -> Result<Vec<AssignedUser>> {
        sqlx::query(
            r#"
            INSERT INTO record_assigned_users (record_id, user_id, assigned_by)
            SELECT $1, id, $3 FROM users WHERE id = ANY($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(record_id)
        .bind(user_ids)
        .bind(assigned_by)
        .execute(&self.pool)
        .await?;

        info!(record_id, count = user_ids.len(), "Assigned users to record");
        self.assigned_users(record_id).await
    }

    pub async fn unassign_user(&self, record_id: i32, user_id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM record_assigned_users WHERE record_id = $1 AND user_id = $2")
            .bind(record_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
