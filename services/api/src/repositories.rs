//! Repositories for database operations
//!
//! Each repository owns a clone of the pool. Multi-step mutations open a
//! transaction and call the `*_in` helpers, which take a bare connection so
//! they compose across repositories inside one unit of work.

use anyhow::Result;
use sqlx::PgConnection;

use crate::metadata::ordering::PositionChange;

pub mod collaborators;
pub mod column_options;
pub mod columns;
pub mod comments;
pub mod modules;
pub mod notifications;
pub mod permissions;
pub mod records;
pub mod roles;
pub mod tables;
pub mod users;
pub mod views;

pub use collaborators::CollaboratorRepository;
pub use column_options::ColumnOptionRepository;
pub use columns::ColumnRepository;
pub use comments::CommentRepository;
pub use modules::ModuleRepository;
pub use notifications::NotificationRepository;
pub use permissions::PermissionRepository;
pub use records::RecordRepository;
pub use roles::RoleRepository;
pub use users::UserRepository;
pub use tables::TableRepository;
pub use views::ViewRepository;

/// Write a position plan. `sql` takes the new position as `$1` and the row
/// id as `$2`.
pub(crate) async fn apply_positions(
    conn: &mut PgConnection,
    sql: &'static str,
    changes: &[PositionChange],
) -> Result<()> {
    for &(id, position) in changes {
        sqlx::query(sql)
            .bind(position)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
