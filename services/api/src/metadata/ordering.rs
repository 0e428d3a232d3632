//! Dense 1-based position ordering for modules, tables and columns.
//!
//! Input is always the `(id, position)` pairs of one sibling group as read
//! from the database. Stored positions may contain gaps or ties; ties are
//! broken by id, which is insertion order. Every plan returns only the rows
//! whose position actually changes.

use super::{MetadataError, MetadataResult};

/// A row's id and its new position
pub type PositionChange = (i32, i32);

/// Ids in display order
pub fn display_order(items: &[(i32, i32)]) -> Vec<i32> {
    let mut sorted = items.to_vec();
    sorted.sort_by_key(|&(id, position)| (position, id));
    sorted.into_iter().map(|(id, _)| id).collect()
}

fn diff(items: &[(i32, i32)], order: &[i32]) -> Vec<PositionChange> {
    order
        .iter()
        .enumerate()
        .filter_map(|(index, &id)| {
            let position = index as i32 + 1;
            let current = items.iter().find(|&&(i, _)| i == id).map(|&(_, p)| p);
            (current != Some(position)).then_some((id, position))
        })
        .collect()
}

fn clamp(target: i32, len: usize) -> usize {
    (target.max(1) as usize).min(len.max(1)) - 1
}

/// Renumber the group to 1..n without moving anything
pub fn compact(items: &[(i32, i32)]) -> Vec<PositionChange> {
    diff(items, &display_order(items))
}

/// Move `id` to `target`, shifting its siblings.
///
/// Targets beyond the ends are clamped.
pub fn move_to(items: &[(i32, i32)], id: i32, target: i32) -> MetadataResult<Vec<PositionChange>> {
    let mut order = display_order(items);
    let from = order
        .iter()
        .position(|&i| i == id)
        .ok_or_else(|| MetadataError::not_found(format!("Item {}", id)))?;

    order.remove(from);
    let to = clamp(target, order.len() + 1);
    order.insert(to, id);

    Ok(diff(items, &order))
}

/// Make room for a new sibling.
///
/// Returns the position the new row gets and the existing rows that shift.
/// Without a target the row is appended.
pub fn insert_at(items: &[(i32, i32)], target: Option<i32>) -> (i32, Vec<PositionChange>) {
    let order = display_order(items);
    let slot = match target {
        Some(t) => clamp(t, order.len() + 1),
        None => order.len(),
    };

    let mut shifted: Vec<i32> = order.clone();
    // placeholder for the new row, never written back
    shifted.insert(slot, i32::MIN);
    let changes = diff(items, &shifted)
        .into_iter()
        .filter(|&(id, _)| id != i32::MIN)
        .collect();

    (slot as i32 + 1, changes)
}

/// Close the gap left by a removed sibling
pub fn remove(items: &[(i32, i32)], id: i32) -> Vec<PositionChange> {
    let remaining: Vec<(i32, i32)> = items.iter().copied().filter(|&(i, _)| i != id).collect();
    compact(&remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(items: &[(i32, i32)], changes: &[PositionChange]) -> Vec<(i32, i32)> {
        let mut out: Vec<(i32, i32)> = items
            .iter()
            .map(|&(id, pos)| {
                let new = changes
                    .iter()
                    .find(|&&(c, _)| c == id)
                    .map_or(pos, |&(_, p)| p);
                (id, new)
            })
            .collect();
        out.sort_by_key(|&(id, pos)| (pos, id));
        out
    }

    fn is_dense(items: &[(i32, i32)]) -> bool {
        let mut positions: Vec<i32> = items.iter().map(|&(_, p)| p).collect();
        positions.sort();
        positions == (1..=items.len() as i32).collect::<Vec<_>>()
    }

    #[test]
    fn test_display_order_breaks_ties_by_id() {
        assert_eq!(display_order(&[(7, 2), (3, 1), (5, 1)]), vec![3, 5, 7]);
    }

    #[test]
    fn test_compact_closes_gaps() {
        let items = [(1, 1), (2, 4), (3, 9)];
        assert_eq!(compact(&items), vec![(2, 2), (3, 3)]);
        assert!(compact(&[(1, 1), (2, 2)]).is_empty());
    }

    #[test]
    fn test_move_down_and_up() {
        let items = [(10, 1), (11, 2), (12, 3), (13, 4)];

        let down = move_to(&items, 10, 3).unwrap();
        assert_eq!(down, vec![(11, 1), (12, 2), (10, 3)]);
        assert!(is_dense(&apply(&items, &down)));

        let up = move_to(&items, 13, 1).unwrap();
        assert_eq!(
            display_order(&apply(&items, &up)),
            vec![13, 10, 11, 12]
        );
    }

    #[test]
    fn test_move_clamps_and_rejects_unknown() {
        let items = [(1, 1), (2, 2), (3, 3)];
        let changes = move_to(&items, 1, 99).unwrap();
        assert_eq!(display_order(&apply(&items, &changes)), vec![2, 3, 1]);

        let changes = move_to(&items, 3, -4).unwrap();
        assert_eq!(display_order(&apply(&items, &changes)), vec![3, 1, 2]);

        assert!(matches!(
            move_to(&items, 42, 1),
            Err(MetadataError::NotFound(_))
        ));
    }

    #[test]
    fn test_move_repairs_ties() {
        let items = [(1, 1), (2, 1), (3, 1)];
        let changes = move_to(&items, 2, 2).unwrap();
        let after = apply(&items, &changes);
        assert!(is_dense(&after));
        assert_eq!(display_order(&after), vec![1, 2, 3]);
    }

    #[test]
    fn test_insert_appends_by_default() {
        let items = [(1, 1), (2, 2)];
        assert_eq!(insert_at(&items, None), (3, vec![]));
        assert_eq!(insert_at(&[], None), (1, vec![]));
    }

    #[test]
    fn test_insert_in_the_middle_shifts_followers() {
        let items = [(1, 1), (2, 2), (3, 3)];
        let (position, changes) = insert_at(&items, Some(2));
        assert_eq!(position, 2);
        assert_eq!(changes, vec![(2, 3), (3, 4)]);
    }

    #[test]
    fn test_remove_closes_gap() {
        let items = [(1, 1), (2, 2), (3, 3)];
        assert_eq!(remove(&items, 2), vec![(3, 2)]);
        assert!(remove(&items, 3).is_empty());
    }
}
