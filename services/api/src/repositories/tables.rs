//! Logical table repository, including the join-table resolver

use anyhow::Result;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};

use crate::{
    metadata::{
        MetadataError,
        join::{self, ExistingColumn, JoinColumnAction, RelationCandidate},
        naming, ordering,
    },
    models::{
        column::Column,
        table::{JoinTableResponse, NewTable, Table, UpdateTable},
    },
    repositories::{
        apply_positions,
        columns::{self, ColumnInsert},
        permissions, records,
    },
};

const TABLE_POSITION_SQL: &str = "UPDATE tables SET position = $1, updated_at = NOW() WHERE id = $2";

/// Fields of a table row about to be inserted
#[derive(Debug, Clone, Default)]
pub(crate) struct TableInsert<'a> {
    pub module_id: Option<i32>,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub original_table_id: Option<i32>,
    pub foreign_table_id: Option<i32>,
    pub position: Option<i32>,
}

/// Logical table repository
#[derive(Clone)]
pub struct TableRepository {
    pool: PgPool,
}

impl TableRepository {
    /// Create a new table repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All tables, grouped by module and in display order
    pub async fn list(&self) -> Result<Vec<Table>> {
        let tables = sqlx::query_as::<_, Table>(
            r#"
            SELECT * FROM tables
            ORDER BY module_id NULLS FIRST, position, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tables)
    }

    pub async fn list_by_module(&self, module_id: i32) -> Result<Vec<Table>> {
        let tables = sqlx::query_as::<_, Table>(
            "SELECT * FROM tables WHERE module_id = $1 ORDER BY position, id",
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tables)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Table>> {
        let mut conn = self.pool.acquire().await?;
        find_in(&mut conn, id).await
    }

    /// Whether `name` is taken (case-insensitive) within a module
    pub async fn exists_name(
        &self,
        module_id: Option<i32>,
        name: &str,
        exclude_id: Option<i32>,
    ) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        name_taken_in(&mut conn, module_id, name, exclude_id).await
    }

    /// Create a table; module-scoped tables get a name check and a position
    pub async fn create(&self, new_table: &NewTable) -> Result<Table> {
        if new_table.original_table_id.is_some() != new_table.foreign_table_id.is_some() {
            return Err(MetadataError::invalid(
                "original_table_id and foreign_table_id must be given together",
            )
            .into());
        }

        let mut tx = self.pool.begin().await?;
        let table = insert_in(
            &mut tx,
            &TableInsert {
                module_id: new_table.module_id,
                name: &new_table.name,
                description: new_table.description.as_deref(),
                original_table_id: new_table.original_table_id,
                foreign_table_id: new_table.foreign_table_id,
                position: new_table.position,
            },
        )
        .await?;
        tx.commit().await?;

        info!(table_id = table.id, "Created table {}", table.name);
        Ok(table)
    }

    pub async fn update(&self, id: i32, changes: &UpdateTable) -> Result<Table> {
        let mut tx = self.pool.begin().await?;
        let current = find_in(&mut tx, id)
            .await?
            .ok_or_else(|| MetadataError::not_found("Table"))?;

        let name = match &changes.name {
            Some(name) => {
                let name = naming::validate_name("Table", name)?;
                if current.module_id.is_some()
                    && name_taken_in(&mut tx, current.module_id, &name, Some(id)).await?
                {
                    return Err(MetadataError::conflict(format!(
                        "A table named '{}' already exists in this module",
                        name
                    ))
                    .into());
                }
                name
            }
            None => current.name.clone(),
        };

        let table = sqlx::query_as::<_, Table>(
            r#"
            UPDATE tables
            SET name = $2, description = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(changes.description.as_ref().or(current.description.as_ref()))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(table_id = id, "Updated table");
        Ok(table)
    }

    /// Delete a table; columns, records and permissions cascade
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let Some(table) = find_in(&mut tx, id).await? else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM tables WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let siblings = sibling_positions(&mut tx, table.module_id).await?;
        apply_positions(&mut tx, TABLE_POSITION_SQL, &ordering::compact(&siblings)).await?;

        tx.commit().await?;
        info!(table_id = id, "Deleted table {}", table.name);
        Ok(true)
    }

    /// Move a table within its module
    pub async fn update_position(&self, id: i32, position: i32) -> Result<Table> {
        let mut tx = self.pool.begin().await?;
        let table = find_in(&mut tx, id)
            .await?
            .ok_or_else(|| MetadataError::not_found("Table"))?;

        let siblings = sibling_positions(&mut tx, table.module_id).await?;
        let changes = ordering::move_to(&siblings, id, position)?;
        apply_positions(&mut tx, TABLE_POSITION_SQL, &changes).await?;

        let table = find_in(&mut tx, id)
            .await?
            .ok_or_else(|| MetadataError::not_found("Table"))?;
        tx.commit().await?;
        Ok(table)
    }

    /// Whether no other record of the table has `value` under `column`
    pub async fn validate_unique(
        &self,
        table_id: i32,
        column: &str,
        value: &str,
        exclude_record_id: Option<i32>,
    ) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        if !columns::name_taken_in(&mut conn, table_id, column, None).await? {
            return Err(MetadataError::not_found(format!("Column '{}'", column)).into());
        }

        let taken = records::value_taken_in(&mut conn, table_id, column, value, exclude_record_id).await?;
        Ok(!taken)
    }

    /// Find or create the join table between two tables.
    ///
    /// Runs in one transaction under an advisory lock on the unordered pair,
    /// so concurrent calls for the same pair resolve to one table.
    pub async fn get_or_create_join_table(
        &self,
        original_table_id: i32,
        foreign_table_id: i32,
        display_column: Option<&str>,
    ) -> Result<JoinTableResponse> {
        if original_table_id == foreign_table_id {
            return Err(MetadataError::invalid("A table cannot be joined with itself").into());
        }
        let display = display_column.map(str::trim).filter(|d| !d.is_empty());

        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(pair_lock_key(original_table_id, foreign_table_id))
            .execute(&mut *tx)
            .await?;

        let original = find_in(&mut tx, original_table_id)
            .await?
            .ok_or_else(|| MetadataError::not_found(format!("Table {}", original_table_id)))?;
        let foreign = find_in(&mut tx, foreign_table_id)
            .await?
            .ok_or_else(|| MetadataError::not_found(format!("Table {}", foreign_table_id)))?;

        let existing = sqlx::query_as::<_, Table>(
            r#"
            SELECT * FROM tables
            WHERE (original_table_id = $1 AND foreign_table_id = $2)
               OR (original_table_id = $2 AND foreign_table_id = $1)
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(original.id)
        .bind(foreign.id)
        .fetch_optional(&mut *tx)
        .await?;

        let (table, plan, created) = match existing {
            Some(table) => {
                // keep the stored orientation so existing rows stay valid
                let (a, b) = (
                    table.original_table_id.unwrap_or(original.id),
                    table.foreign_table_id.unwrap_or(foreign.id),
                );
                let current: Vec<ExistingColumn> = columns::list_in(&mut tx, table.id)
                    .await?
                    .into_iter()
                    .map(|c| ExistingColumn {
                        id: c.id,
                        name: c.name,
                        foreign_table_id: c.foreign_table_id,
                        foreign_column_name: c.foreign_column_name,
                    })
                    .collect();
                if let Some(display) = display {
                    ensure_display_column_in(&mut tx, b, display).await?;
                }
                let plan = join::plan_columns(a, b, display, &current);
                debug!(table_id = table.id, actions = plan.len(), "Reconciling join table");
                (table, plan, false)
            }
            None => {
                let candidates = relation_candidates(&mut tx, original.id, foreign.id).await?;
                let display = join::pick_display_column(display, &candidates);
                ensure_display_column_in(&mut tx, foreign.id, &display).await?;
                let name = naming::join_table_name(&original.name, &foreign.name);
                let description = format!("Relation between {} and {}", original.name, foreign.name);

                let table = insert_in(
                    &mut tx,
                    &TableInsert {
                        module_id: original.module_id,
                        name: &name,
                        description: Some(&description),
                        original_table_id: Some(original.id),
                        foreign_table_id: Some(foreign.id),
                        position: None,
                    },
                )
                .await?;
                let plan = join::plan_columns(original.id, foreign.id, Some(&display), &[]);
                (table, plan, true)
            }
        };

        for action in &plan {
            match action {
                JoinColumnAction::Create(spec) => {
                    columns::insert_in(
                        &mut tx,
                        &ColumnInsert {
                            table_id: table.id,
                            name: spec.name,
                            data_type: spec.data_type,
                            is_required: true,
                            is_foreign_key: true,
                            foreign_table_id: Some(spec.foreign_table_id),
                            foreign_column_name: Some(&spec.foreign_column_name),
                            relation_type: Some(spec.relation_type),
                            validations: None,
                            position: Some(spec.position),
                            is_unique: false,
                        },
                    )
                    .await?;
                }
                JoinColumnAction::Retarget {
                    column_id,
                    foreign_table_id,
                    foreign_column_name,
                } => {
                    columns::retarget_in(&mut tx, *column_id, *foreign_table_id, foreign_column_name)
                        .await?;
                }
            }
        }

        if created {
            permissions::grant_read_to_all_roles_in(&mut tx, table.id).await?;
        }

        let columns: Vec<Column> = columns::list_in(&mut tx, table.id).await?;
        tx.commit().await?;

        if created {
            info!(table_id = table.id, "Created join table {}", table.name);
        }
        Ok(JoinTableResponse {
            table,
            columns,
            created,
        })
    }
}

async fn ensure_display_column_in(conn: &mut PgConnection, table_id: i32, display: &str) -> Result<()> {
    let names: Vec<String> = columns::list_in(conn, table_id)
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();
    join::check_display_column(display, names.iter().map(String::as_str))?;
    Ok(())
}

/// Advisory lock key for an unordered table pair
pub(crate) fn pair_lock_key(a: i32, b: i32) -> i64 {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    ((low as i64) << 32) | (high as u32 as i64)
}

pub(crate) async fn find_in(conn: &mut PgConnection, id: i32) -> Result<Option<Table>> {
    let table = sqlx::query_as::<_, Table>("SELECT * FROM tables WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(table)
}

async fn name_taken_in(
    conn: &mut PgConnection,
    module_id: Option<i32>,
    name: &str,
    exclude_id: Option<i32>,
) -> Result<bool> {
    let taken: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM tables
            WHERE module_id IS NOT DISTINCT FROM $1
              AND LOWER(name) = LOWER($2)
              AND ($3::INTEGER IS NULL OR id <> $3)
        )
        "#,
    )
    .bind(module_id)
    .bind(name.trim())
    .bind(exclude_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(taken)
}

async fn sibling_positions(conn: &mut PgConnection, module_id: Option<i32>) -> Result<Vec<(i32, i32)>> {
    let rows = sqlx::query_as::<_, (i32, i32)>(
        "SELECT id, position FROM tables WHERE module_id IS NOT DISTINCT FROM $1 FOR UPDATE",
    )
    .bind(module_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

async fn relation_candidates(
    conn: &mut PgConnection,
    original_table_id: i32,
    foreign_table_id: i32,
) -> Result<Vec<RelationCandidate>> {
    let rows = sqlx::query_as::<_, (bool, Option<String>)>(
        r#"
        SELECT table_id = $1, foreign_column_name
        FROM columns
        WHERE data_type = 'foreign'
          AND ((table_id = $1 AND foreign_table_id = $2)
            OR (table_id = $2 AND foreign_table_id = $1))
        ORDER BY id
        "#,
    )
    .bind(original_table_id)
    .bind(foreign_table_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(from_original, foreign_column_name)| RelationCandidate {
            from_original,
            foreign_column_name,
        })
        .collect())
}

/// Insert a table row, checking the module-scoped name and shifting siblings.
/// Tables outside any module are inserted without the name check.
pub(crate) async fn insert_in(conn: &mut PgConnection, new_table: &TableInsert<'_>) -> Result<Table> {
    let name = naming::validate_name("Table", new_table.name)?;

    if new_table.module_id.is_some()
        && name_taken_in(conn, new_table.module_id, &name, None).await?
    {
        return Err(MetadataError::conflict(format!(
            "A table named '{}' already exists in this module",
            name
        ))
        .into());
    }

    let siblings = sibling_positions(conn, new_table.module_id).await?;
    let (position, shifts) = ordering::insert_at(&siblings, new_table.position);
    apply_positions(conn, TABLE_POSITION_SQL, &shifts).await?;

    let table = sqlx::query_as::<_, Table>(
        r#"
        INSERT INTO tables (module_id, name, description, original_table_id, foreign_table_id, position)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(new_table.module_id)
    .bind(&name)
    .bind(new_table.description)
    .bind(new_table.original_table_id)
    .bind(new_table.foreign_table_id)
    .bind(position)
    .fetch_one(&mut *conn)
    .await?;

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_lock_key_is_order_independent() {
        assert_eq!(pair_lock_key(3, 9), pair_lock_key(9, 3));
        assert_ne!(pair_lock_key(3, 9), pair_lock_key(3, 10));
        assert_eq!(pair_lock_key(1, 2), (1_i64 << 32) | 2);
    }
}
