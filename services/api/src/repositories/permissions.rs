//! Permission repository: the (role, table) matrix and effective rights

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::info;

use crate::{
    metadata::{MetadataError, PermissionFlags, permissions},
    models::permission::{NewPermission, Permission, TableUserPermissions},
};

#[derive(FromRow)]
struct TableGrant {
    table_id: i32,
    #[sqlx(flatten)]
    flags: PermissionFlags,
}

#[derive(FromRow)]
struct UserGrant {
    user_id: i32,
    name: String,
    email: String,
    is_admin: bool,
    #[sqlx(flatten)]
    flags: PermissionFlags,
}

/// Permission repository
#[derive(Clone)]
pub struct PermissionRepository {
    pool: PgPool,
}

impl PermissionRepository {
    /// Create a new permission repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Permission>> {
        let rows = sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions ORDER BY role_id, table_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn find(&self, role_id: i32, table_id: i32) -> Result<Option<Permission>> {
        let row = sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE role_id = $1 AND table_id = $2",
        )
        .bind(role_id)
        .bind(table_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Insert a new row; an existing (role, table) pair is a conflict
    pub async fn create(&self, new_permission: &NewPermission) -> Result<Permission> {
        let flags = new_permission.flags;
        let row = sqlx::query_as::<_, Permission>(
            r#"
            INSERT INTO permissions (role_id, table_id, can_create, can_read, can_update, can_delete)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new_permission.role_id)
        .bind(new_permission.table_id)
        .bind(flags.can_create)
        .bind(flags.can_read)
        .bind(flags.can_update)
        .bind(flags.can_delete)
        .fetch_one(&self.pool)
        .await?;

        info!(role_id = row.role_id, table_id = row.table_id, "Created permission");
        Ok(row)
    }

    /// Set the flags of a (role, table) pair, creating the row if needed
    pub async fn upsert(&self, role_id: i32, table_id: i32, flags: PermissionFlags) -> Result<Permission> {
        let mut conn = self.pool.acquire().await?;
        upsert_in(&mut conn, role_id, table_id, flags).await
    }

    pub async fn delete(&self, role_id: i32, table_id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM permissions WHERE role_id = $1 AND table_id = $2")
            .bind(role_id)
            .bind(table_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether the user holds an active admin role
    pub async fn is_admin(&self, user_id: i32) -> Result<bool> {
        let admin: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_roles ur
                JOIN roles r ON r.id = ur.role_id
                WHERE ur.user_id = $1 AND r.active AND r.is_admin
            )
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(admin)
    }

    /// Effective flags of a user on one table, OR-ed across the rows of
    /// their active roles. An admin role without rows contributes nothing.
    pub async fn user_permissions(&self, user_id: i32, table_id: i32) -> Result<PermissionFlags> {
        let grants = sqlx::query_as::<_, PermissionFlags>(
            r#"
            SELECT p.can_create, p.can_read, p.can_update, p.can_delete
            FROM permissions p
            JOIN user_roles ur ON ur.role_id = p.role_id
            JOIN roles r ON r.id = p.role_id
            WHERE ur.user_id = $1 AND p.table_id = $2 AND r.active
            "#,
        )
        .bind(user_id)
        .bind(table_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions::effective(grants))
    }

    /// Effective flags of a user on every table they can reach
    pub async fn user_permissions_all_tables(&self, user_id: i32) -> Result<BTreeMap<i32, PermissionFlags>> {
        let grants = sqlx::query_as::<_, TableGrant>(
            r#"
            SELECT p.table_id, p.can_create, p.can_read, p.can_update, p.can_delete
            FROM permissions p
            JOIN user_roles ur ON ur.role_id = p.role_id
            JOIN roles r ON r.id = p.role_id
            WHERE ur.user_id = $1 AND r.active
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions::effective_by_table(
            grants.into_iter().map(|g| (g.table_id, g.flags)),
        ))
    }

    /// Replace every row of a role in one transaction. Tables whose flags
    /// are all false end up with no row.
    pub async fn bulk_update_role(
        &self,
        role_id: i32,
        requested: &HashMap<i32, PermissionFlags>,
    ) -> Result<Vec<Permission>> {
        let mut tx = self.pool.begin().await?;
        ensure_role_in(&mut tx, role_id).await?;

        let removed = sqlx::query("DELETE FROM permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut written = Vec::new();
        for (table_id, flags) in permissions::rows_to_write(requested) {
            written.push(upsert_in(&mut tx, role_id, table_id, flags).await?);
        }

        tx.commit().await?;
        info!(
            role_id,
            removed,
            written = written.len(),
            "Replaced role permissions"
        );
        Ok(written)
    }

    /// Give several roles the same flags on one table
    pub async fn assign_to_roles(
        &self,
        table_id: i32,
        role_ids: &[i32],
        flags: PermissionFlags,
    ) -> Result<Vec<Permission>> {
        let mut tx = self.pool.begin().await?;

        let mut written = Vec::with_capacity(role_ids.len());
        for &role_id in role_ids {
            ensure_role_in(&mut tx, role_id).await?;
            if flags.any() {
                written.push(upsert_in(&mut tx, role_id, table_id, flags).await?);
            } else {
                sqlx::query("DELETE FROM permissions WHERE role_id = $1 AND table_id = $2")
                    .bind(role_id)
                    .bind(table_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        info!(table_id, roles = role_ids.len(), "Assigned permissions to roles");
        Ok(written)
    }

    /// Every active user with their effective flags on a table
    pub async fn table_users(&self, table_id: i32) -> Result<Vec<TableUserPermissions>> {
        let rows = sqlx::query_as::<_, UserGrant>(
            r#"
            SELECT u.id AS user_id, u.name, u.email,
                   COALESCE(BOOL_OR(r.is_admin), FALSE) AS is_admin,
                   COALESCE(BOOL_OR(p.can_create), FALSE) AS can_create,
                   COALESCE(BOOL_OR(p.can_read), FALSE) AS can_read,
                   COALESCE(BOOL_OR(p.can_update), FALSE) AS can_update,
                   COALESCE(BOOL_OR(p.can_delete), FALSE) AS can_delete
            FROM users u
            LEFT JOIN user_roles ur ON ur.user_id = u.id
            LEFT JOIN roles r ON r.id = ur.role_id AND r.active
            LEFT JOIN permissions p ON p.role_id = r.id AND p.table_id = $1
            WHERE u.is_active AND NOT u.is_blocked
            GROUP BY u.id, u.name, u.email
            ORDER BY u.name, u.id
            "#,
        )
        .bind(table_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TableUserPermissions {
                user_id: row.user_id,
                name: row.name,
                email: row.email,
                is_admin: row.is_admin,
                flags: row.flags,
            })
            .collect())
    }
}

async fn ensure_role_in(conn: &mut PgConnection, role_id: i32) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM roles WHERE id = $1)")
        .bind(role_id)
        .fetch_one(&mut *conn)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(MetadataError::not_found(format!("Role {}", role_id)).into())
    }
}

async fn upsert_in(conn: &mut PgConnection, role_id: i32, table_id: i32, flags: PermissionFlags) -> Result<Permission> {
    let row = sqlx::query_as::<_, Permission>(
        r#"
        INSERT INTO permissions (role_id, table_id, can_create, can_read, can_update, can_delete)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (role_id, table_id) DO UPDATE
        SET can_create = EXCLUDED.can_create,
            can_read = EXCLUDED.can_read,
            can_update = EXCLUDED.can_update,
            can_delete = EXCLUDED.can_delete
        RETURNING *
        "#,
    )
    .bind(role_id)
    .bind(table_id)
    .bind(flags.can_create)
    .bind(flags.can_read)
    .bind(flags.can_update)
    .bind(flags.can_delete)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

/// Give every active role read-only access to a new table
pub(crate) async fn grant_read_to_all_roles_in(conn: &mut PgConnection, table_id: i32) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO permissions (role_id, table_id, can_create, can_read, can_update, can_delete)
        SELECT id, $1, FALSE, TRUE, FALSE, FALSE FROM roles WHERE active
        ON CONFLICT (role_id, table_id) DO NOTHING
        "#,
    )
    .bind(table_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
