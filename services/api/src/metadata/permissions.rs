//! Effective CRUD permissions

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    ops::BitOr,
};

/// CRUD action on a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// The four CRUD flags of a permission row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(default)]
pub struct PermissionFlags {
    pub can_create: bool,
    pub can_read: bool,
    pub can_update: bool,
    pub can_delete: bool,
}

impl PermissionFlags {
    pub const NONE: PermissionFlags = PermissionFlags {
        can_create: false,
        can_read: false,
        can_update: false,
        can_delete: false,
    };

    pub const ALL: PermissionFlags = PermissionFlags {
        can_create: true,
        can_read: true,
        can_update: true,
        can_delete: true,
    };

    pub const READ_ONLY: PermissionFlags = PermissionFlags {
        can_create: false,
        can_read: true,
        can_update: false,
        can_delete: false,
    };

    /// At least one flag set
    pub fn any(&self) -> bool {
        self.can_create || self.can_read || self.can_update || self.can_delete
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Create => self.can_create,
            Action::Read => self.can_read,
            Action::Update => self.can_update,
            Action::Delete => self.can_delete,
        }
    }
}

impl BitOr for PermissionFlags {
    type Output = PermissionFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        PermissionFlags {
            can_create: self.can_create || rhs.can_create,
            can_read: self.can_read || rhs.can_read,
            can_update: self.can_update || rhs.can_update,
            can_delete: self.can_delete || rhs.can_delete,
        }
    }
}

/// OR-combine the grants of every role a user holds on one table.
/// No rows means no access. Admin roles are not special here.
pub fn effective(grants: impl IntoIterator<Item = PermissionFlags>) -> PermissionFlags {
    grants
        .into_iter()
        .fold(PermissionFlags::NONE, |acc, grant| acc | grant)
}

/// Same as [`effective`], grouped by table id
pub fn effective_by_table(
    grants: impl IntoIterator<Item = (i32, PermissionFlags)>,
) -> BTreeMap<i32, PermissionFlags> {
    let mut merged: BTreeMap<i32, PermissionFlags> = BTreeMap::new();
    for (table_id, grant) in grants {
        let entry = merged.entry(table_id).or_default();
        *entry = *entry | grant;
    }
    merged
}

/// Rows a bulk replace writes: tables with at least one flag, by table id
pub fn rows_to_write(requested: &HashMap<i32, PermissionFlags>) -> Vec<(i32, PermissionFlags)> {
    let mut rows: Vec<(i32, PermissionFlags)> = requested
        .iter()
        .filter(|(_, flags)| flags.any())
        .map(|(&table_id, &flags)| (table_id, flags))
        .collect();
    rows.sort_by_key(|&(table_id, _)| table_id);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(c: bool, r: bool, u: bool, d: bool) -> PermissionFlags {
        PermissionFlags {
            can_create: c,
            can_read: r,
            can_update: u,
            can_delete: d,
        }
    }

    #[test]
    fn test_editor_and_viewer_combine() {
        let editor = flags(false, false, true, false);
        let viewer = flags(false, true, false, false);

        assert_eq!(
            effective([editor, viewer]),
            flags(false, true, true, false)
        );
    }

    #[test]
    fn test_no_roles_means_no_access() {
        assert_eq!(effective(Vec::<PermissionFlags>::new()), PermissionFlags::NONE);
        assert!(!PermissionFlags::NONE.any());
    }

    #[test]
    fn test_or_is_order_independent() {
        let grants = [
            flags(true, false, false, false),
            flags(false, false, false, true),
            flags(false, true, false, false),
        ];
        let forward = effective(grants);
        let backward = effective(grants.iter().rev().copied());
        assert_eq!(forward, backward);
        assert_eq!(forward, flags(true, true, false, true));
    }

    #[test]
    fn test_effective_by_table_groups() {
        let merged = effective_by_table([
            (42, flags(false, false, true, false)),
            (7, PermissionFlags::READ_ONLY),
            (42, flags(false, true, false, false)),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&42], flags(false, true, true, false));
        assert_eq!(merged[&7], PermissionFlags::READ_ONLY);
    }

    #[test]
    fn test_bulk_replace_skips_all_false_tables() {
        let requested = HashMap::from([
            (1, PermissionFlags::READ_ONLY),
            (2, PermissionFlags::NONE),
        ]);
        assert_eq!(rows_to_write(&requested), vec![(1, PermissionFlags::READ_ONLY)]);
    }

    #[test]
    fn test_flags_deserialize_with_defaults() {
        let parsed: HashMap<i32, PermissionFlags> =
            serde_json::from_str(r#"{"42": {"can_read": true}}"#).unwrap();
        assert_eq!(parsed[&42], PermissionFlags::READ_ONLY);
        assert!(parsed[&42].allows(Action::Read));
        assert!(!parsed[&42].allows(Action::Delete));
    }
}
