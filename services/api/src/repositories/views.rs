//! Saved view repository

use anyhow::Result;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use crate::{
    metadata::{MetadataError, naming},
    models::view::{NewView, NewViewSort, View, ViewSort, ViewWithSorts},
};

/// Saved view repository
#[derive(Clone)]
pub struct ViewRepository {
    pool: PgPool,
}

impl ViewRepository {
    /// Create a new view repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_by_table(&self, table_id: i32) -> Result<Vec<ViewWithSorts>> {
        let views = sqlx::query_as::<_, View>("SELECT * FROM views WHERE table_id = $1 ORDER BY id")
            .bind(table_id)
            .fetch_all(&self.pool)
            .await?;

        let mut conn = self.pool.acquire().await?;
        let mut out = Vec::with_capacity(views.len());
        for view in views {
            let sorts = sorts_in(&mut conn, view.id).await?;
            out.push(ViewWithSorts { view, sorts });
        }
        Ok(out)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<ViewWithSorts>> {
        let mut conn = self.pool.acquire().await?;
        let Some(view) = sqlx::query_as::<_, View>("SELECT * FROM views WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };

        let sorts = sorts_in(&mut conn, id).await?;
        Ok(Some(ViewWithSorts { view, sorts }))
    }

    pub async fn create(&self, new_view: &NewView, created_by: i32) -> Result<ViewWithSorts> {
        let name = naming::validate_name("View", &new_view.name)?;

        let mut tx = self.pool.begin().await?;
        let view = sqlx::query_as::<_, View>(
            "INSERT INTO views (table_id, name, created_by) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(new_view.table_id)
        .bind(&name)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        let sorts = replace_sorts_in(&mut tx, view.id, view.table_id, &new_view.sorts).await?;
        tx.commit().await?;

        info!(view_id = view.id, table_id = view.table_id, "Created view {}", view.name);
        Ok(ViewWithSorts { view, sorts })
    }

    /// Replace the ordered sort list of a view
    pub async fn replace_sorts(&self, id: i32, sorts: &[NewViewSort]) -> Result<ViewWithSorts> {
        let mut tx = self.pool.begin().await?;
        let view = sqlx::query_as::<_, View>("SELECT * FROM views WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| MetadataError::not_found("View"))?;

        let sorts = replace_sorts_in(&mut tx, id, view.table_id, sorts).await?;
        tx.commit().await?;
        Ok(ViewWithSorts { view, sorts })
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM views WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

async fn sorts_in(conn: &mut PgConnection, view_id: i32) -> Result<Vec<ViewSort>> {
    let sorts = sqlx::query_as::<_, ViewSort>(
        "SELECT * FROM view_sorts WHERE view_id = $1 ORDER BY position, id",
    )
    .bind(view_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(sorts)
}

async fn replace_sorts_in(
    conn: &mut PgConnection,
    view_id: i32,
    table_id: i32,
    sorts: &[NewViewSort],
) -> Result<Vec<ViewSort>> {
    sqlx::query("DELETE FROM view_sorts WHERE view_id = $1")
        .bind(view_id)
        .execute(&mut *conn)
        .await?;

    let mut written = Vec::with_capacity(sorts.len());
    for (index, sort) in sorts.iter().enumerate() {
        let row = sqlx::query_as::<_, ViewSort>(
            r#"
            INSERT INTO view_sorts (view_id, column_id, direction, position)
            SELECT $1, id, $3, $4 FROM columns WHERE id = $2 AND table_id = $5
            RETURNING *
            "#,
        )
        .bind(view_id)
        .bind(sort.column_id)
        .bind(sort.direction.as_str())
        .bind(index as i32 + 1)
        .bind(table_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| MetadataError::invalid(format!("Column {} is not part of this table", sort.column_id)))?;

        written.push(row);
    }

    Ok(written)
}
