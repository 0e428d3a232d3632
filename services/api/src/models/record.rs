//! Record models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{FromRow, types::Json};

/// Row of a logical table
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Record {
    pub id: i32,
    pub table_id: i32,
    pub record_data: Json<Map<String, Value>>,
    pub position: i32,
    pub original_record_id: Option<i32>,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRecord {
    pub table_id: i32,
    #[serde(default)]
    pub record_data: Map<String, Value>,
    pub original_record_id: Option<i32>,
}

/// Partial update; keys not present keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRecord {
    #[serde(default)]
    pub record_data: Map<String, Value>,
    pub position: Option<i32>,
}
