//! Join-table reconciliation for many-to-many relations.
//!
//! A join table links table A (`original_table_id`) and table B
//! (`foreign_table_id`) through exactly two foreign-key columns:
//! `original_record_id` pointing at `A.id` and `foreign_record_id` pointing
//! at B's display column. The functions here only decide; the tables
//! repository applies the plan inside one transaction.

use super::{DataType, MetadataError, MetadataResult, RelationType};

pub const ORIGINAL_RECORD_COLUMN: &str = "original_record_id";
pub const FOREIGN_RECORD_COLUMN: &str = "foreign_record_id";
pub const DEFAULT_DISPLAY_COLUMN: &str = "id";

/// A column currently defined on the join table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingColumn {
    pub id: i32,
    pub name: String,
    pub foreign_table_id: Option<i32>,
    pub foreign_column_name: Option<String>,
}

/// An existing `foreign` column that already relates the two tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationCandidate {
    /// True when the column lives on A and points at B
    pub from_original: bool,
    pub foreign_column_name: Option<String>,
}

/// Definition of one of the two join columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinColumnSpec {
    pub name: &'static str,
    pub data_type: DataType,
    pub relation_type: RelationType,
    pub foreign_table_id: i32,
    pub foreign_column_name: String,
    pub position: i32,
}

/// What has to change on the join table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinColumnAction {
    Create(JoinColumnSpec),
    Retarget {
        column_id: i32,
        foreign_table_id: i32,
        foreign_column_name: String,
    },
}

/// Pick the display column of B for a new join table.
///
/// An explicit request wins; otherwise reuse what an existing `foreign`
/// column between the pair already shows (columns on A first), else `id`.
pub fn pick_display_column(requested: Option<&str>, candidates: &[RelationCandidate]) -> String {
    if let Some(name) = requested.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    candidates
        .iter()
        .filter(|c| c.from_original)
        .chain(candidates.iter().filter(|c| !c.from_original))
        .find_map(|c| c.foreign_column_name.clone().filter(|n| !n.is_empty()))
        .unwrap_or_else(|| DEFAULT_DISPLAY_COLUMN.to_string())
}

/// Reject a display column that B does not define. `id` always exists.
pub fn check_display_column<'a>(
    display: &str,
    foreign_columns: impl IntoIterator<Item = &'a str>,
) -> MetadataResult<()> {
    if display == DEFAULT_DISPLAY_COLUMN || foreign_columns.into_iter().any(|c| c == display) {
        return Ok(());
    }
    Err(MetadataError::invalid(format!(
        "Display column '{}' does not exist on the related table",
        display
    )))
}

/// Decide which join columns to create or retarget.
///
/// `display` is `None` when the caller did not ask for a specific display
/// column; an existing `foreign_record_id` is then left alone.
pub fn plan_columns(
    original_table_id: i32,
    foreign_table_id: i32,
    display: Option<&str>,
    existing: &[ExistingColumn],
) -> Vec<JoinColumnAction> {
    let mut actions = Vec::new();

    match existing.iter().find(|c| c.name == ORIGINAL_RECORD_COLUMN) {
        Some(col) => {
            if !points_at(col, original_table_id, DEFAULT_DISPLAY_COLUMN) {
                actions.push(JoinColumnAction::Retarget {
                    column_id: col.id,
                    foreign_table_id: original_table_id,
                    foreign_column_name: DEFAULT_DISPLAY_COLUMN.to_string(),
                });
            }
        }
        None => actions.push(JoinColumnAction::Create(JoinColumnSpec {
            name: ORIGINAL_RECORD_COLUMN,
            data_type: DataType::Foreign,
            relation_type: RelationType::ManyToMany,
            foreign_table_id: original_table_id,
            foreign_column_name: DEFAULT_DISPLAY_COLUMN.to_string(),
            position: 1,
        })),
    }

    match existing.iter().find(|c| c.name == FOREIGN_RECORD_COLUMN) {
        Some(col) => {
            let wanted = display.unwrap_or_else(|| {
                col.foreign_column_name
                    .as_deref()
                    .unwrap_or(DEFAULT_DISPLAY_COLUMN)
            });
            if !points_at(col, foreign_table_id, wanted) {
                actions.push(JoinColumnAction::Retarget {
                    column_id: col.id,
                    foreign_table_id,
                    foreign_column_name: wanted.to_string(),
                });
            }
        }
        None => actions.push(JoinColumnAction::Create(JoinColumnSpec {
            name: FOREIGN_RECORD_COLUMN,
            data_type: DataType::Foreign,
            relation_type: RelationType::ManyToMany,
            foreign_table_id,
            foreign_column_name: display.unwrap_or(DEFAULT_DISPLAY_COLUMN).to_string(),
            position: 2,
        })),
    }

    actions
}

fn points_at(col: &ExistingColumn, table_id: i32, column: &str) -> bool {
    col.foreign_table_id == Some(table_id) && col.foreign_column_name.as_deref() == Some(column)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: i32 = 1;
    const B: i32 = 2;

    fn column(id: i32, name: &str, table: i32, display: &str) -> ExistingColumn {
        ExistingColumn {
            id,
            name: name.to_string(),
            foreign_table_id: Some(table),
            foreign_column_name: Some(display.to_string()),
        }
    }

    #[test]
    fn test_display_column_must_exist_on_foreign_table() {
        assert!(check_display_column("id", std::iter::empty()).is_ok());
        assert!(check_display_column("nombre", ["nombre", "precio"]).is_ok());
        assert_eq!(
            check_display_column("codigo", ["nombre"]),
            Err(MetadataError::invalid(
                "Display column 'codigo' does not exist on the related table"
            ))
        );
    }

    #[test]
    fn test_new_join_table_gets_both_columns() {
        let actions = plan_columns(A, B, Some("nombre"), &[]);
        assert_eq!(actions.len(), 2);

        let JoinColumnAction::Create(original) = &actions[0] else {
            panic!("expected create");
        };
        assert_eq!(original.name, ORIGINAL_RECORD_COLUMN);
        assert_eq!(original.foreign_table_id, A);
        assert_eq!(original.foreign_column_name, "id");

        let JoinColumnAction::Create(foreign) = &actions[1] else {
            panic!("expected create");
        };
        assert_eq!(foreign.name, FOREIGN_RECORD_COLUMN);
        assert_eq!(foreign.foreign_table_id, B);
        assert_eq!(foreign.foreign_column_name, "nombre");
    }

    #[test]
    fn test_reconciled_table_needs_nothing() {
        let existing = [
            column(10, ORIGINAL_RECORD_COLUMN, A, "id"),
            column(11, FOREIGN_RECORD_COLUMN, B, "nombre"),
        ];
        assert!(plan_columns(A, B, Some("nombre"), &existing).is_empty());
        assert!(plan_columns(A, B, None, &existing).is_empty());
    }

    #[test]
    fn test_new_display_column_retargets_in_place() {
        let existing = [
            column(10, ORIGINAL_RECORD_COLUMN, A, "id"),
            column(11, FOREIGN_RECORD_COLUMN, B, "nombre"),
        ];
        assert_eq!(
            plan_columns(A, B, Some("codigo"), &existing),
            vec![JoinColumnAction::Retarget {
                column_id: 11,
                foreign_table_id: B,
                foreign_column_name: "codigo".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_column_is_created_alone() {
        let existing = [column(11, FOREIGN_RECORD_COLUMN, B, "nombre")];
        let actions = plan_columns(A, B, None, &existing);
        assert_eq!(actions.len(), 1);
        assert!(matches!(
            &actions[0],
            JoinColumnAction::Create(spec) if spec.name == ORIGINAL_RECORD_COLUMN
        ));
    }

    #[test]
    fn test_pick_display_column() {
        assert_eq!(pick_display_column(Some(" codigo "), &[]), "codigo");
        assert_eq!(pick_display_column(None, &[]), "id");
        assert_eq!(pick_display_column(Some(""), &[]), "id");

        let candidates = [
            RelationCandidate {
                from_original: false,
                foreign_column_name: Some("razon_social".to_string()),
            },
            RelationCandidate {
                from_original: true,
                foreign_column_name: Some("numero".to_string()),
            },
        ];
        assert_eq!(pick_display_column(None, &candidates), "numero");
        assert_eq!(pick_display_column(None, &candidates[..1]), "razon_social");
    }
}
