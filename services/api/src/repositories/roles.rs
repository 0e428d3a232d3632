//! Role repository

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use crate::{
    metadata::{MetadataError, naming},
    models::{
        role::{NewRole, Role, UpdateRole},
        user::User,
    },
};

/// Role repository
#[derive(Clone)]
pub struct RoleRepository {
    pool: PgPool,
}

impl RoleRepository {
    /// Create a new role repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT * FROM roles WHERE active OR $1 ORDER BY name, id",
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(role)
    }

    async fn name_taken(&self, name: &str, exclude_id: Option<i32>) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM roles
                WHERE active AND LOWER(name) = LOWER($1)
                  AND ($2::INTEGER IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    pub async fn create(&self, new_role: &NewRole) -> Result<Role> {
        let name = naming::validate_name("Role", &new_role.name)?;
        if self.name_taken(&name, None).await? {
            return Err(MetadataError::conflict(format!("A role named '{}' already exists", name)).into());
        }

        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, description, is_admin)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&name)
        .bind(&new_role.description)
        .bind(new_role.is_admin)
        .fetch_one(&self.pool)
        .await?;

        info!(role_id = role.id, "Created role {}", role.name);
        Ok(role)
    }

    pub async fn update(&self, id: i32, changes: &UpdateRole) -> Result<Role> {
        let name = changes
            .name
            .as_deref()
            .map(|n| naming::validate_name("Role", n))
            .transpose()?;
        if let Some(name) = &name {
            if self.name_taken(name, Some(id)).await? {
                return Err(MetadataError::conflict(format!("A role named '{}' already exists", name)).into());
            }
        }

        let role = sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_admin = COALESCE($4, is_admin),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(&changes.description)
        .bind(changes.is_admin)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| MetadataError::not_found("Role"))?;

        info!(role_id = id, "Updated role");
        Ok(role)
    }

    /// Soft delete: the role stays for history but grants nothing
    pub async fn deactivate(&self, id: i32) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE roles SET active = FALSE, updated_at = NOW() WHERE id = $1 AND active",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        info!(role_id = id, "Deactivated role");
        Ok(result.rows_affected() > 0)
    }

    pub async fn assign_users(&self, role_id: i32, user_ids: &[i32]) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT id, $1 FROM users WHERE id = ANY($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(user_ids)
        .execute(&self.pool)
        .await?;

        info!(role_id, assigned = result.rows_affected(), "Assigned users to role");
        Ok(result.rows_affected())
    }

    pub async fn remove_users(&self, role_id: i32, user_ids: &[i32]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_roles WHERE role_id = $1 AND user_id = ANY($2)")
            .bind(role_id)
            .bind(user_ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn users(&self, role_id: i32) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN user_roles ur ON ur.user_id = u.id
            WHERE ur.role_id = $1
            ORDER BY u.name, u.id
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
