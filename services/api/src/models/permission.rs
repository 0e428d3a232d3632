//! Permission models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

use crate::metadata::PermissionFlags;

/// One (role, table) row of the permission matrix
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: i32,
    pub role_id: i32,
    pub table_id: i32,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub flags: PermissionFlags,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPermission {
    pub role_id: i32,
    pub table_id: i32,
    #[serde(flatten)]
    pub flags: PermissionFlags,
}

/// `POST /permissions/role/:role_id/bulk`, keyed by table id
#[derive(Debug, Clone, Deserialize)]
pub struct BulkRolePermissions {
    pub permissions: HashMap<i32, PermissionFlags>,
}

/// `POST /permissions/table/:table_id/roles`
#[derive(Debug, Clone, Deserialize)]
pub struct AssignRolesPermissions {
    pub role_ids: Vec<i32>,
    #[serde(flatten)]
    pub flags: PermissionFlags,
}

/// Effective flags of one user on one table
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableUserPermissions {
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    #[serde(flatten)]
    pub flags: PermissionFlags,
}
