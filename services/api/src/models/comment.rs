//! Record comments and assigned users

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecordComment {
    pub id: i32,
    pub record_id: i32,
    pub table_id: i32,
    pub user_id: i32,
    pub user_name: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentBody {
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssignedUser {
    pub record_id: i32,
    pub user_id: i32,
    pub user_name: String,
    pub user_email: String,
    pub assigned_by: Option<i32>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignUsers {
    pub user_ids: Vec<i32>,
}
