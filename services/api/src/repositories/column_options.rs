//! Column option repository

use anyhow::Result;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use crate::{
    metadata::{DataType, MetadataError, data_type::value_as_text, join::DEFAULT_DISPLAY_COLUMN},
    models::column::{AvailableOption, ColumnOption, NewColumnOption, UpdateColumnOption},
    repositories::columns,
};

/// Column option repository
#[derive(Clone)]
pub struct ColumnOptionRepository {
    pool: PgPool,
}

impl ColumnOptionRepository {
    /// Create a new column option repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append options to a select column
    pub async fn create_many(&self, column_id: i32, options: &[NewColumnOption]) -> Result<Vec<ColumnOption>> {
        let mut tx = self.pool.begin().await?;
        let column = columns::find_in(&mut tx, column_id)
            .await?
            .ok_or_else(|| MetadataError::not_found("Column"))?;
        if column.data_type != DataType::Select {
            return Err(MetadataError::invalid("Options can only be added to select columns").into());
        }

        let created = insert_in(&mut tx, column_id, options).await?;
        tx.commit().await?;

        info!(column_id, count = created.len(), "Added column options");
        Ok(created)
    }

    pub async fn list(&self, column_id: i32) -> Result<Vec<ColumnOption>> {
        let options = sqlx::query_as::<_, ColumnOption>(
            "SELECT * FROM column_options WHERE column_id = $1 ORDER BY position, id",
        )
        .bind(column_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(options)
    }

    pub async fn delete_all(&self, column_id: i32) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        delete_all_in(&mut conn, column_id).await
    }

    pub async fn update(&self, id: i32, changes: &UpdateColumnOption) -> Result<Option<ColumnOption>> {
        let option = sqlx::query_as::<_, ColumnOption>(
            r#"
            UPDATE column_options
            SET value = COALESCE($2, value),
                label = COALESCE($3, label),
                position = COALESCE($4, position)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.value.as_deref().map(str::trim))
        .bind(&changes.label)
        .bind(changes.position)
        .fetch_optional(&self.pool)
        .await?;

        Ok(option)
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM column_options WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Values a cell of this column may take.
    ///
    /// Select columns offer their options; relation columns offer the
    /// display values of the records of the table they point at.
    pub async fn available_options(&self, column_id: i32) -> Result<Vec<AvailableOption>> {
        let mut conn = self.pool.acquire().await?;
        let column = columns::find_in(&mut conn, column_id)
            .await?
            .ok_or_else(|| MetadataError::not_found("Column"))?;

        match column.data_type {
            DataType::Select => {
                let options = self.list(column_id).await?;
                Ok(options
                    .into_iter()
                    .map(|o| AvailableOption {
                        value: Value::String(o.value),
                        label: o.label,
                    })
                    .collect())
            }
            DataType::Foreign | DataType::Tabla => {
                let Some(target) = column.foreign_table_id else {
                    return Ok(Vec::new());
                };
                let display = column
                    .foreign_column_name
                    .as_deref()
                    .unwrap_or(DEFAULT_DISPLAY_COLUMN);
                related_values(&mut conn, target, display).await
            }
            DataType::String
            | DataType::Integer
            | DataType::Decimal
            | DataType::Boolean
            | DataType::Date
            | DataType::DateTime
            | DataType::Json
            | DataType::Text
            | DataType::Uuid => Err(MetadataError::invalid(format!(
                "Columns of type {} have no selectable values",
                column.data_type
            ))
            .into()),
        }
    }
}

/// Options of every select column of a table
pub(crate) async fn list_for_table_in(conn: &mut PgConnection, table_id: i32) -> Result<Vec<ColumnOption>> {
    let options = sqlx::query_as::<_, ColumnOption>(
        r#"
        SELECT o.* FROM column_options o
        JOIN columns c ON c.id = o.column_id
        WHERE c.table_id = $1
        ORDER BY o.column_id, o.position, o.id
        "#,
    )
    .bind(table_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(options)
}

/// Insert options after the current last one, skipping blank values
pub(crate) async fn insert_in(
    conn: &mut PgConnection,
    column_id: i32,
    options: &[NewColumnOption],
) -> Result<Vec<ColumnOption>> {
    let mut next: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM column_options WHERE column_id = $1",
    )
    .bind(column_id)
    .fetch_one(&mut *conn)
    .await?;

    let mut created = Vec::with_capacity(options.len());
    for option in options {
        let value = option.value.trim();
        if value.is_empty() {
            continue;
        }
        let label = option
            .label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(value);

        let row = sqlx::query_as::<_, ColumnOption>(
            r#"
            INSERT INTO column_options (column_id, value, label, position)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(column_id)
        .bind(value)
        .bind(label)
        .bind(next)
        .fetch_one(&mut *conn)
        .await?;

        next += 1;
        created.push(row);
    }

    Ok(created)
}

pub(crate) async fn delete_all_in(conn: &mut PgConnection, column_id: i32) -> Result<u64> {
    let result = sqlx::query("DELETE FROM column_options WHERE column_id = $1")
        .bind(column_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

async fn related_values(conn: &mut PgConnection, table_id: i32, display: &str) -> Result<Vec<AvailableOption>> {
    if display == DEFAULT_DISPLAY_COLUMN {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM records WHERE table_id = $1 ORDER BY position, id",
        )
        .bind(table_id)
        .fetch_all(&mut *conn)
        .await?;

        return Ok(ids
            .into_iter()
            .map(|id| AvailableOption {
                value: Value::from(id),
                label: id.to_string(),
            })
            .collect());
    }

    let values = sqlx::query_scalar::<_, Option<Value>>(
        "SELECT record_data -> $2 FROM records WHERE table_id = $1 ORDER BY position, id",
    )
    .bind(table_id)
    .bind(display)
    .fetch_all(&mut *conn)
    .await?;

    let mut options: Vec<AvailableOption> = Vec::new();
    for value in values.into_iter().flatten() {
        let Some(label) = value_as_text(&value).filter(|l| !l.is_empty()) else {
            continue;
        };
        if options.iter().all(|o| o.label != label) {
            options.push(AvailableOption { value, label });
        }
    }
    Ok(options)
}
