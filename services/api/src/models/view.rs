//! Saved table views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct View {
    pub id: i32,
    pub table_id: i32,
    pub name: String,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ViewSort {
    pub id: i32,
    pub view_id: i32,
    pub column_id: i32,
    pub direction: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewWithSorts {
    #[serde(flatten)]
    pub view: View,
    pub sorts: Vec<ViewSort>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewViewSort {
    pub column_id: i32,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewView {
    pub table_id: i32,
    pub name: String,
    #[serde(default)]
    pub sorts: Vec<NewViewSort>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceSorts {
    pub sorts: Vec<NewViewSort>,
}
