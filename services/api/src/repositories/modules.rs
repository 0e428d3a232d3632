//! Module repository

use anyhow::Result;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use crate::{
    metadata::{MetadataError, naming, ordering},
    models::module::{Module, NewModule, UpdateModule},
    repositories::apply_positions,
};

const MODULE_POSITION_SQL: &str = "UPDATE modules SET position = $1, updated_at = NOW() WHERE id = $2";

/// Module repository
#[derive(Clone)]
pub struct ModuleRepository {
    pool: PgPool,
}

impl ModuleRepository {
    /// Create a new module repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Module>> {
        let modules = sqlx::query_as::<_, Module>(
            "SELECT * FROM modules WHERE active ORDER BY position, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(modules)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Module>> {
        let module = sqlx::query_as::<_, Module>("SELECT * FROM modules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(module)
    }

    pub async fn create(&self, new_module: &NewModule, created_by: i32) -> Result<Module> {
        let name = naming::validate_name("Module", &new_module.name)?;

        let mut tx = self.pool.begin().await?;
        let siblings = sibling_positions(&mut tx).await?;
        let (position, shifts) = ordering::insert_at(&siblings, new_module.position);
        apply_positions(&mut tx, MODULE_POSITION_SQL, &shifts).await?;

        let module = sqlx::query_as::<_, Module>(
            r#"
            INSERT INTO modules (name, description, icon, position, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&name)
        .bind(&new_module.description)
        .bind(&new_module.icon)
        .bind(position)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(module_id = module.id, "Created module {}", module.name);
        Ok(module)
    }

    pub async fn update(&self, id: i32, changes: &UpdateModule) -> Result<Module> {
        let name = changes
            .name
            .as_deref()
            .map(|n| naming::validate_name("Module", n))
            .transpose()?;

        let module = sqlx::query_as::<_, Module>(
            r#"
            UPDATE modules
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                icon = COALESCE($4, icon),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(&changes.description)
        .bind(&changes.icon)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| MetadataError::not_found("Module"))?;

        Ok(module)
    }

    /// Delete a module with its tables and close the gap
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let siblings = sibling_positions(&mut tx).await?;
        let result = sqlx::query("DELETE FROM modules WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        apply_positions(&mut tx, MODULE_POSITION_SQL, &ordering::remove(&siblings, id)).await?;

        tx.commit().await?;
        info!(module_id = id, "Deleted module");
        Ok(true)
    }

    pub async fn update_position(&self, id: i32, position: i32) -> Result<Module> {
        let mut tx = self.pool.begin().await?;
        let siblings = sibling_positions(&mut tx).await?;
        let changes = ordering::move_to(&siblings, id, position)?;
        apply_positions(&mut tx, MODULE_POSITION_SQL, &changes).await?;

        let module = sqlx::query_as::<_, Module>("SELECT * FROM modules WHERE id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(module)
    }
}

async fn sibling_positions(conn: &mut PgConnection) -> Result<Vec<(i32, i32)>> {
    let rows = sqlx::query_as::<_, (i32, i32)>(
        "SELECT id, position FROM modules WHERE active FOR UPDATE",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}
