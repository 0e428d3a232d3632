//! Record repository
//!
//! Payloads are conformed to the column list (missing keys back-filled,
//! stale keys dropped) and validated before every write.

use std::collections::HashMap;

use anyhow::Result;
use serde_json::{Map, Value};
use sqlx::{PgConnection, PgPool, types::Json};
use tracing::info;

use crate::{
    metadata::{
        MetadataError,
        data_type::{is_empty, value_as_text},
        ordering,
        record_data::{self, FieldRule},
    },
    models::record::{NewRecord, Record, UpdateRecord},
    repositories::{apply_positions, column_options, columns, tables},
};

const RECORD_POSITION_SQL: &str = "UPDATE records SET position = $1, updated_at = NOW() WHERE id = $2";

/// Record repository
#[derive(Clone)]
pub struct RecordRepository {
    pool: PgPool,
}

impl RecordRepository {
    /// Create a new record repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_by_table(&self, table_id: i32) -> Result<Vec<Record>> {
        let records = sqlx::query_as::<_, Record>(
            "SELECT * FROM records WHERE table_id = $1 ORDER BY position, id",
        )
        .bind(table_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Record>> {
        let record = sqlx::query_as::<_, Record>("SELECT * FROM records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Insert a record at the end of its table
    pub async fn create(&self, new_record: &NewRecord, created_by: i32) -> Result<Record> {
        let mut tx = self.pool.begin().await?;
        tables::find_in(&mut tx, new_record.table_id)
            .await?
            .ok_or_else(|| MetadataError::not_found("Table"))?;

        let data = checked_payload(&mut tx, new_record.table_id, new_record.record_data.clone(), None).await?;

        let siblings = sibling_positions(&mut tx, new_record.table_id).await?;
        let (position, _) = ordering::insert_at(&siblings, None);

        let record = sqlx::query_as::<_, Record>(
            r#"
            INSERT INTO records (table_id, record_data, position, original_record_id, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new_record.table_id)
        .bind(Json(&data))
        .bind(position)
        .bind(new_record.original_record_id)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(record_id = record.id, table_id = record.table_id, "Created record");
        Ok(record)
    }

    /// Merge a partial payload into a record and optionally move it
    pub async fn update(&self, id: i32, changes: &UpdateRecord) -> Result<Record> {
        let mut tx = self.pool.begin().await?;
        let current = sqlx::query_as::<_, Record>("SELECT * FROM records WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| MetadataError::not_found("Record"))?;

        let merged = record_data::merge(current.record_data.0, changes.record_data.clone());
        let data = checked_payload(&mut tx, current.table_id, merged, Some(id)).await?;

        if let Some(position) = changes.position {
            let siblings = sibling_positions(&mut tx, current.table_id).await?;
            let moves = ordering::move_to(&siblings, id, position)?;
            apply_positions(&mut tx, RECORD_POSITION_SQL, &moves).await?;
        }

        let record = sqlx::query_as::<_, Record>(
            r#"
            UPDATE records
            SET record_data = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json(&data))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(record_id = id, "Updated record");
        Ok(record)
    }

    /// Delete a record and close the gap it leaves
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let table_id: Option<i32> = sqlx::query_scalar("DELETE FROM records WHERE id = $1 RETURNING table_id")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(table_id) = table_id else {
            return Ok(false);
        };

        let siblings = sibling_positions(&mut tx, table_id).await?;
        apply_positions(&mut tx, RECORD_POSITION_SQL, &ordering::compact(&siblings)).await?;

        tx.commit().await?;
        info!(record_id = id, table_id, "Deleted record");
        Ok(true)
    }
}

/// Conform a payload to the table's columns and reject invalid values
async fn checked_payload(
    conn: &mut PgConnection,
    table_id: i32,
    data: Map<String, Value>,
    exclude_record_id: Option<i32>,
) -> Result<Map<String, Value>> {
    let rules: Vec<FieldRule> = columns::list_in(conn, table_id)
        .await?
        .iter()
        .map(|c| c.field_rule())
        .collect();

    let mut options: HashMap<i32, Vec<String>> = HashMap::new();
    for option in column_options::list_for_table_in(conn, table_id).await? {
        options.entry(option.column_id).or_default().push(option.value);
    }

    let data = record_data::conform(data, &rules);
    record_data::validate(&data, &rules, &options)?;

    for rule in rules.iter().filter(|r| r.is_unique) {
        let Some(value) = data.get(&rule.name).filter(|v| !is_empty(v)) else {
            continue;
        };
        let Some(text) = value_as_text(value) else {
            continue;
        };
        if value_taken_in(conn, table_id, &rule.name, &text, exclude_record_id).await? {
            return Err(MetadataError::conflict(format!(
                "'{}' must be unique; '{}' is already used",
                rule.name, text
            ))
            .into());
        }
    }

    Ok(data)
}

pub(crate) async fn value_taken_in(
    conn: &mut PgConnection,
    table_id: i32,
    column: &str,
    value: &str,
    exclude_record_id: Option<i32>,
) -> Result<bool> {
    let taken: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM records
            WHERE table_id = $1
              AND record_data ->> $2 = $3
              AND ($4::INTEGER IS NULL OR id <> $4)
        )
        "#,
    )
    .bind(table_id)
    .bind(column)
    .bind(value)
    .bind(exclude_record_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(taken)
}

async fn sibling_positions(conn: &mut PgConnection, table_id: i32) -> Result<Vec<(i32, i32)>> {
    let rows = sqlx::query_as::<_, (i32, i32)>(
        "SELECT id, position FROM records WHERE table_id = $1 FOR UPDATE",
    )
    .bind(table_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}
