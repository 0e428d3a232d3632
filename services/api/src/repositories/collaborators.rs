//! Table collaborator repository

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use crate::models::collaborator::TableCollaborator;

const COLLABORATOR_SELECT: &str = r#"
    SELECT tc.id, tc.table_id, tc.user_id, u.name AS user_name, u.email AS user_email,
           tc.assigned_by, tc.notes, tc.is_active, tc.created_at, tc.updated_at
    FROM table_collaborators tc
    JOIN users u ON u.id = tc.user_id
"#;

/// Table collaborator repository
#[derive(Clone)]
pub struct CollaboratorRepository {
    pool: PgPool,
}

impl CollaboratorRepository {
    /// Create a new collaborator repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Active collaborators of a table
    pub async fn list_by_table(&self, table_id: i32) -> Result<Vec<TableCollaborator>> {
        let sql = format!("{COLLABORATOR_SELECT} WHERE tc.table_id = $1 AND tc.is_active ORDER BY u.name");
        let rows = sqlx::query_as::<_, TableCollaborator>(&sql)
            .bind(table_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Make `user_ids` the exact set of active collaborators of a table
    pub async fn assign(
        &self,
        table_id: i32,
        user_ids: &[i32],
        notes: Option<&str>,
        assigned_by: i32,
    ) -> Result<Vec<TableCollaborator>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE table_collaborators SET is_active = FALSE, updated_at = NOW() WHERE table_id = $1",
        )
        .bind(table_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO table_collaborators (table_id, user_id, assigned_by, notes)
            SELECT $1, id, $3, $4 FROM users WHERE id = ANY($2)
            ON CONFLICT (table_id, user_id) DO UPDATE
            SET is_active = TRUE,
                assigned_by = EXCLUDED.assigned_by,
                notes = COALESCE(EXCLUDED.notes, table_collaborators.notes),
                updated_at = NOW()
            "#,
        )
        .bind(table_id)
        .bind(user_ids)
        .bind(assigned_by)
        .bind(notes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(table_id, count = user_ids.len(), "Assigned table collaborators");
        self.list_by_table(table_id).await
    }

    pub async fn remove(&self, table_id: i32, user_id: i32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE table_collaborators
            SET is_active = FALSE, updated_at = NOW()
            WHERE table_id = $1 AND user_id = $2 AND is_active
            "#,
        )
        .bind(table_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_collaborator(&self, table_id: i32, user_id: i32) -> Result<bool> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM table_collaborators
                WHERE table_id = $1 AND user_id = $2 AND is_active
            )
            "#,
        )
        .bind(table_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(found)
    }
}
