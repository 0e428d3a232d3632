//! Logical table models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::column::Column;

/// A user-defined table; join tables carry both relation ids
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Table {
    pub id: i32,
    pub module_id: Option<i32>,
    pub name: String,
    pub description: Option<String>,
    pub original_table_id: Option<i32>,
    pub foreign_table_id: Option<i32>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Table {
    pub fn is_join_table(&self) -> bool {
        self.original_table_id.is_some() && self.foreign_table_id.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTable {
    pub module_id: Option<i32>,
    pub name: String,
    pub description: Option<String>,
    pub original_table_id: Option<i32>,
    pub foreign_table_id: Option<i32>,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTable {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// `GET /tables/exists/name`
#[derive(Debug, Clone, Deserialize)]
pub struct TableNameQuery {
    pub module_id: Option<i32>,
    pub name: String,
    pub exclude_table_id: Option<i32>,
}

/// `POST /tables/join`
#[derive(Debug, Clone, Deserialize)]
pub struct JoinTableRequest {
    pub original_table_id: i32,
    pub foreign_table_id: i32,
    pub column_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinTableResponse {
    pub table: Table,
    pub columns: Vec<Column>,
    pub created: bool,
}

/// `GET /tables/:tableId/validate-unique`
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateUniqueQuery {
    pub column: String,
    pub value: String,
    pub exclude_record_id: Option<i32>,
}
