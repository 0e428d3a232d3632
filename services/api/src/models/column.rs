//! Column and column option models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};

use crate::metadata::{DataType, RelationType, record_data::FieldRule};

/// Column of a logical table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub id: i32,
    pub table_id: i32,
    pub name: String,
    pub data_type: DataType,
    pub is_required: bool,
    pub is_foreign_key: bool,
    pub foreign_table_id: Option<i32>,
    pub foreign_column_name: Option<String>,
    pub relation_type: Option<RelationType>,
    pub validations: Option<serde_json::Value>,
    pub column_position: i32,
    pub is_unique: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Column {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let data_type: String = row.try_get("data_type")?;
        let relation_type: Option<String> = row.try_get("relation_type")?;

        Ok(Column {
            id: row.try_get("id")?,
            table_id: row.try_get("table_id")?,
            name: row.try_get("name")?,
            data_type: data_type.parse().map_err(|e| sqlx::Error::ColumnDecode {
                index: "data_type".to_string(),
                source: Box::new(e),
            })?,
            is_required: row.try_get("is_required")?,
            is_foreign_key: row.try_get("is_foreign_key")?,
            foreign_table_id: row.try_get("foreign_table_id")?,
            foreign_column_name: row.try_get("foreign_column_name")?,
            relation_type: relation_type
                .map(|r| r.parse())
                .transpose()
                .map_err(|e| sqlx::Error::ColumnDecode {
                    index: "relation_type".to_string(),
                    source: Box::new(e),
                })?,
            validations: row.try_get("validations")?,
            column_position: row.try_get("column_position")?,
            is_unique: row.try_get("is_unique")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Column {
    pub fn field_rule(&self) -> FieldRule {
        FieldRule {
            column_id: self.id,
            name: self.name.clone(),
            data_type: self.data_type,
            is_required: self.is_required,
            is_unique: self.is_unique,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewColumn {
    pub table_id: i32,
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_foreign_key: bool,
    pub foreign_table_id: Option<i32>,
    pub foreign_column_name: Option<String>,
    pub relation_type: Option<RelationType>,
    pub validations: Option<serde_json::Value>,
    pub column_position: Option<i32>,
    #[serde(default)]
    pub is_unique: bool,
    pub custom_options: Option<Vec<NewColumnOption>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateColumn {
    pub name: Option<String>,
    pub data_type: Option<DataType>,
    pub is_required: Option<bool>,
    pub is_foreign_key: Option<bool>,
    pub foreign_table_id: Option<i32>,
    pub foreign_column_name: Option<String>,
    pub relation_type: Option<RelationType>,
    pub validations: Option<serde_json::Value>,
    pub is_unique: Option<bool>,
    /// Replaces the option list of a select column
    pub custom_options: Option<Vec<NewColumnOption>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnWithOptions {
    #[serde(flatten)]
    pub column: Column,
    pub options: Vec<ColumnOption>,
}

/// `GET /columns/table/:table_id/exists-name`
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnNameQuery {
    pub name: String,
    pub exclude_column_id: Option<i32>,
}

/// Allowed value of a select column
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ColumnOption {
    pub id: i32,
    pub column_id: i32,
    pub value: String,
    pub label: String,
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewColumnOption {
    pub value: String,
    /// Defaults to the value
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateColumnOption {
    pub value: Option<String>,
    pub label: Option<String>,
    pub position: Option<i32>,
}

/// Body of `POST /columns/:columnId/options`
#[derive(Debug, Clone, Deserialize)]
pub struct NewColumnOptions {
    pub options: Vec<NewColumnOption>,
}

/// Value a select or relation column may take
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AvailableOption {
    pub value: serde_json::Value,
    pub label: String,
}
