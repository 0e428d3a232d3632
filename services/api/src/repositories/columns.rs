//! Column repository
//!
//! Column mutations keep record payloads in step: creating a column
//! back-fills every record, renaming moves the key, deleting drops it. Each
//! of these runs in the same transaction as the metadata change.

use std::collections::HashMap;

use anyhow::Result;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use crate::{
    metadata::{
        DataType, MetadataError, RelationType,
        join::{FOREIGN_RECORD_COLUMN, ORIGINAL_RECORD_COLUMN},
        naming, ordering,
    },
    models::column::{Column, ColumnOption, ColumnWithOptions, NewColumn, UpdateColumn},
    repositories::{
        apply_positions, column_options,
        tables::{self, TableInsert},
    },
};

const COLUMN_POSITION_SQL: &str =
    "UPDATE columns SET column_position = $1, updated_at = NOW() WHERE id = $2";

/// Fields of a column row about to be inserted
#[derive(Debug, Clone)]
pub(crate) struct ColumnInsert<'a> {
    pub table_id: i32,
    pub name: &'a str,
    pub data_type: DataType,
    pub is_required: bool,
    pub is_foreign_key: bool,
    pub foreign_table_id: Option<i32>,
    pub foreign_column_name: Option<&'a str>,
    pub relation_type: Option<RelationType>,
    pub validations: Option<&'a serde_json::Value>,
    pub position: Option<i32>,
    pub is_unique: bool,
}

/// Column repository
#[derive(Clone)]
pub struct ColumnRepository {
    pool: PgPool,
}

impl ColumnRepository {
    /// Create a new column repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Column>> {
        let columns = sqlx::query_as::<_, Column>(
            "SELECT * FROM columns ORDER BY table_id, column_position, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(columns)
    }

    pub async fn list_by_table(&self, table_id: i32) -> Result<Vec<Column>> {
        let mut conn = self.pool.acquire().await?;
        list_in(&mut conn, table_id).await
    }

    /// Columns of a table with the options of its select columns
    pub async fn list_by_table_with_options(&self, table_id: i32) -> Result<Vec<ColumnWithOptions>> {
        let mut conn = self.pool.acquire().await?;
        let columns = list_in(&mut conn, table_id).await?;
        let mut by_column: HashMap<i32, Vec<ColumnOption>> = HashMap::new();
        for option in column_options::list_for_table_in(&mut conn, table_id).await? {
            by_column.entry(option.column_id).or_default().push(option);
        }

        Ok(columns
            .into_iter()
            .map(|column| ColumnWithOptions {
                options: by_column.remove(&column.id).unwrap_or_default(),
                column,
            })
            .collect())
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Column>> {
        let mut conn = self.pool.acquire().await?;
        find_in(&mut conn, id).await
    }

    pub async fn exists_name(&self, table_id: i32, name: &str, exclude_id: Option<i32>) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        name_taken_in(&mut conn, table_id, name, exclude_id).await
    }

    /// Whether any record holds a non-empty value for this column
    pub async fn has_records(&self, id: i32) -> Result<bool> {
        let column = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| MetadataError::not_found("Column"))?;

        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM records
                WHERE table_id = $1
                  AND record_data ? $2
                  AND record_data -> $2 <> 'null'::jsonb
                  AND record_data -> $2 <> '""'::jsonb
            )
            "#,
        )
        .bind(column.table_id)
        .bind(&column.name)
        .fetch_one(&self.pool)
        .await?;

        Ok(found)
    }

    /// Create a column, its related table (`tabla`), its options (`select`)
    /// and back-fill the new key into existing records, all or nothing.
    pub async fn create(&self, new_column: &NewColumn) -> Result<Column> {
        let mut tx = self.pool.begin().await?;

        let table = tables::find_in(&mut tx, new_column.table_id)
            .await?
            .ok_or_else(|| MetadataError::not_found("Table"))?;
        let name = naming::validate_name("Column", &new_column.name)?;

        let mut foreign_table_id = new_column.foreign_table_id;
        let mut foreign_column_name = new_column.foreign_column_name.clone();
        let mut is_foreign_key = new_column.is_foreign_key;
        let mut relation_type = new_column.relation_type;

        match new_column.data_type {
            DataType::Tabla => {
                let description = format!("Detail table of {}.{}", table.name, name);
                let related = tables::insert_in(
                    &mut tx,
                    &TableInsert {
                        module_id: table.module_id,
                        name: &name,
                        description: Some(&description),
                        ..Default::default()
                    },
                )
                .await?;
                info!(table_id = related.id, "Created related table for column {}", name);

                foreign_table_id = Some(related.id);
                foreign_column_name.get_or_insert_with(|| "id".to_string());
                is_foreign_key = true;
                relation_type = Some(RelationType::OneToMany);
            }
            DataType::Foreign => {
                let target = foreign_table_id
                    .ok_or_else(|| MetadataError::invalid("foreign_table_id is required"))?;
                tables::find_in(&mut tx, target)
                    .await?
                    .ok_or_else(|| MetadataError::not_found(format!("Table {}", target)))?;
                foreign_column_name.get_or_insert_with(|| "id".to_string());
                is_foreign_key = true;
            }
            DataType::String
            | DataType::Integer
            | DataType::Decimal
            | DataType::Boolean
            | DataType::Date
            | DataType::DateTime
            | DataType::Json
            | DataType::Text
            | DataType::Uuid
            | DataType::Select => {}
        }

        let column = insert_in(
            &mut tx,
            &ColumnInsert {
                table_id: table.id,
                name: &name,
                data_type: new_column.data_type,
                is_required: new_column.is_required,
                is_foreign_key,
                foreign_table_id,
                foreign_column_name: foreign_column_name.as_deref(),
                relation_type,
                validations: new_column.validations.as_ref(),
                position: new_column.column_position,
                is_unique: new_column.is_unique,
            },
        )
        .await?;

        if column.data_type == DataType::Select {
            if let Some(options) = &new_column.custom_options {
                column_options::insert_in(&mut tx, column.id, options).await?;
            }
        }

        tx.commit().await?;
        info!(column_id = column.id, table_id = table.id, "Created column {}", column.name);
        Ok(column)
    }

    /// Update a column; a rename moves the key in every record of the table
    pub async fn update(&self, id: i32, changes: &UpdateColumn) -> Result<Column> {
        let mut tx = self.pool.begin().await?;
        let current = find_for_update_in(&mut tx, id).await?;

        let name = match &changes.name {
            Some(name) => naming::validate_name("Column", name)?,
            None => current.name.clone(),
        };

        if name != current.name {
            if is_join_column(&mut tx, &current).await? {
                return Err(MetadataError::invalid("Join table columns cannot be renamed").into());
            }
            if name_taken_in(&mut tx, current.table_id, &name, Some(id)).await? {
                return Err(MetadataError::conflict(format!(
                    "A column named '{}' already exists in this table",
                    name
                ))
                .into());
            }
            let moved = rename_key_in_records(&mut tx, current.table_id, &current.name, &name).await?;
            let repointed = repoint_references_in(&mut tx, current.table_id, &current.name, &name).await?;
            info!(
                column_id = id,
                records = moved,
                references = repointed,
                "Renamed column {} to {}",
                current.name,
                name
            );
        }

        let data_type = changes.data_type.unwrap_or(current.data_type);
        let column = sqlx::query_as::<_, Column>(
            r#"
            UPDATE columns
            SET name = $2, data_type = $3, is_required = $4, is_foreign_key = $5,
                foreign_table_id = $6, foreign_column_name = $7, relation_type = $8,
                validations = $9, is_unique = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(data_type.as_str())
        .bind(changes.is_required.unwrap_or(current.is_required))
        .bind(changes.is_foreign_key.unwrap_or(current.is_foreign_key))
        .bind(changes.foreign_table_id.or(current.foreign_table_id))
        .bind(
            changes
                .foreign_column_name
                .as_ref()
                .or(current.foreign_column_name.as_ref()),
        )
        .bind(changes.relation_type.or(current.relation_type).map(|r| r.as_str()))
        .bind(changes.validations.as_ref().or(current.validations.as_ref()))
        .bind(changes.is_unique.unwrap_or(current.is_unique))
        .fetch_one(&mut *tx)
        .await?;

        if let (DataType::Select, Some(options)) = (data_type, &changes.custom_options) {
            column_options::delete_all_in(&mut tx, id).await?;
            column_options::insert_in(&mut tx, id, options).await?;
        }

        tx.commit().await?;
        Ok(column)
    }

    /// Delete a column and drop its key from every record
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let Some(column) = find_in(&mut tx, id).await? else {
            return Ok(false);
        };
        if is_join_column(&mut tx, &column).await? {
            return Err(MetadataError::invalid("Join table columns cannot be deleted").into());
        }

        sqlx::query("DELETE FROM columns WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE records
            SET record_data = record_data - $2, updated_at = NOW()
            WHERE table_id = $1 AND record_data ? $2
            "#,
        )
        .bind(column.table_id)
        .bind(&column.name)
        .execute(&mut *tx)
        .await?;

        let siblings = sibling_positions(&mut tx, column.table_id).await?;
        apply_positions(&mut tx, COLUMN_POSITION_SQL, &ordering::compact(&siblings)).await?;

        tx.commit().await?;
        info!(column_id = id, "Deleted column {}", column.name);
        Ok(true)
    }

    /// Move a column within its table
    pub async fn update_position(&self, id: i32, position: i32) -> Result<Column> {
        let mut tx = self.pool.begin().await?;
        let column = find_for_update_in(&mut tx, id).await?;

        let siblings = sibling_positions(&mut tx, column.table_id).await?;
        let changes = ordering::move_to(&siblings, id, position)?;
        apply_positions(&mut tx, COLUMN_POSITION_SQL, &changes).await?;

        let column = find_for_update_in(&mut tx, id).await?;
        tx.commit().await?;
        Ok(column)
    }
}

pub(crate) async fn find_in(conn: &mut PgConnection, id: i32) -> Result<Option<Column>> {
    let column = sqlx::query_as::<_, Column>("SELECT * FROM columns WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(column)
}

async fn find_for_update_in(conn: &mut PgConnection, id: i32) -> Result<Column> {
    let column = sqlx::query_as::<_, Column>("SELECT * FROM columns WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| MetadataError::not_found("Column"))?;

    Ok(column)
}

/// Columns of one table in display order
pub(crate) async fn list_in(conn: &mut PgConnection, table_id: i32) -> Result<Vec<Column>> {
    let columns = sqlx::query_as::<_, Column>(
        "SELECT * FROM columns WHERE table_id = $1 ORDER BY column_position, id",
    )
    .bind(table_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(columns)
}

pub(crate) async fn name_taken_in(
    conn: &mut PgConnection,
    table_id: i32,
    name: &str,
    exclude_id: Option<i32>,
) -> Result<bool> {
    let taken: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM columns
            WHERE table_id = $1 AND name = $2
              AND ($3::INTEGER IS NULL OR id <> $3)
        )
        "#,
    )
    .bind(table_id)
    .bind(name.trim())
    .bind(exclude_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(taken)
}

async fn sibling_positions(conn: &mut PgConnection, table_id: i32) -> Result<Vec<(i32, i32)>> {
    let rows = sqlx::query_as::<_, (i32, i32)>(
        "SELECT id, column_position FROM columns WHERE table_id = $1 FOR UPDATE",
    )
    .bind(table_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

async fn is_join_column(conn: &mut PgConnection, column: &Column) -> Result<bool> {
    if column.name != ORIGINAL_RECORD_COLUMN && column.name != FOREIGN_RECORD_COLUMN {
        return Ok(false);
    }
    let table = tables::find_in(conn, column.table_id).await?;
    Ok(table.is_some_and(|t| t.is_join_table()))
}

/// Insert a column row at its position and back-fill the key into every
/// existing record of the table.
pub(crate) async fn insert_in(conn: &mut PgConnection, column: &ColumnInsert<'_>) -> Result<Column> {
    if name_taken_in(conn, column.table_id, column.name, None).await? {
        return Err(MetadataError::conflict(format!(
            "A column named '{}' already exists in this table",
            column.name
        ))
        .into());
    }

    let siblings = sibling_positions(conn, column.table_id).await?;
    let (position, shifts) = ordering::insert_at(&siblings, column.position);
    apply_positions(conn, COLUMN_POSITION_SQL, &shifts).await?;

    let inserted = sqlx::query_as::<_, Column>(
        r#"
        INSERT INTO columns (
            table_id, name, data_type, is_required, is_foreign_key, foreign_table_id,
            foreign_column_name, relation_type, validations, column_position, is_unique
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(column.table_id)
    .bind(column.name)
    .bind(column.data_type.as_str())
    .bind(column.is_required)
    .bind(column.is_foreign_key)
    .bind(column.foreign_table_id)
    .bind(column.foreign_column_name)
    .bind(column.relation_type.map(|r| r.as_str()))
    .bind(column.validations)
    .bind(position)
    .bind(column.is_unique)
    .fetch_one(&mut *conn)
    .await?;

    add_field_to_records(conn, &inserted).await?;
    Ok(inserted)
}

/// Point an existing relation column at another table/column
pub(crate) async fn retarget_in(
    conn: &mut PgConnection,
    id: i32,
    foreign_table_id: i32,
    foreign_column_name: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE columns
        SET foreign_table_id = $2, foreign_column_name = $3, is_foreign_key = TRUE, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(foreign_table_id)
    .bind(foreign_column_name)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn add_field_to_records(conn: &mut PgConnection, column: &Column) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE records
        SET record_data = record_data || jsonb_build_object($2::TEXT, $3::JSONB), updated_at = NOW()
        WHERE table_id = $1 AND NOT (record_data ? $2)
        "#,
    )
    .bind(column.table_id)
    .bind(&column.name)
    .bind(column.data_type.backfill_value())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Point columns that display `table_id.from` at the renamed column
async fn repoint_references_in(conn: &mut PgConnection, table_id: i32, from: &str, to: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE columns
        SET foreign_column_name = $3, updated_at = NOW()
        WHERE foreign_table_id = $1 AND foreign_column_name = $2
        "#,
    )
    .bind(table_id)
    .bind(from)
    .bind(to)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

async fn rename_key_in_records(conn: &mut PgConnection, table_id: i32, from: &str, to: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE records
        SET record_data = (record_data - $2) || jsonb_build_object($3::TEXT, record_data -> $2),
            updated_at = NOW()
        WHERE table_id = $1 AND record_data ? $2
        "#,
    )
    .bind(table_id)
    .bind(from)
    .bind(to)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
