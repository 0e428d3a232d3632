//! Table collaborator models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User collaborating on a table outside the role matrix
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TableCollaborator {
    pub id: i32,
    pub table_id: i32,
    pub user_id: i32,
    pub user_name: String,
    pub user_email: String,
    pub assigned_by: Option<i32>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignCollaborators {
    pub user_ids: Vec<i32>,
    pub notes: Option<String>,
}
