//! Application state shared across handlers

use common::cache::RedisPool;
use sqlx::PgPool;

use crate::{
    middleware::JwtVerifier,
    repositories::{
        CollaboratorRepository, ColumnOptionRepository, ColumnRepository, CommentRepository,
        ModuleRepository, NotificationRepository, PermissionRepository, RecordRepository,
        RoleRepository, TableRepository, UserRepository, ViewRepository,
    },
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub redis_pool: RedisPool,
    pub jwt_verifier: JwtVerifier,
    pub module_repository: ModuleRepository,
    pub table_repository: TableRepository,
    pub column_repository: ColumnRepository,
    pub column_option_repository: ColumnOptionRepository,
    pub permission_repository: PermissionRepository,
    pub record_repository: RecordRepository,
    pub role_repository: RoleRepository,
    pub user_repository: UserRepository,
    pub collaborator_repository: CollaboratorRepository,
    pub comment_repository: CommentRepository,
    pub notification_repository: NotificationRepository,
    pub view_repository: ViewRepository,
}

impl AppState {
    /// Build every repository on top of one shared pool
    pub fn new(db_pool: PgPool, redis_pool: RedisPool, jwt_verifier: JwtVerifier) -> Self {
        AppState {
            module_repository: ModuleRepository::new(db_pool.clone()),
            table_repository: TableRepository::new(db_pool.clone()),
            column_repository: ColumnRepository::new(db_pool.clone()),
            column_option_repository: ColumnOptionRepository::new(db_pool.clone()),
            permission_repository: PermissionRepository::new(db_pool.clone()),
            record_repository: RecordRepository::new(db_pool.clone()),
            role_repository: RoleRepository::new(db_pool.clone()),
            user_repository: UserRepository::new(db_pool.clone()),
            collaborator_repository: CollaboratorRepository::new(db_pool.clone()),
            comment_repository: CommentRepository::new(db_pool.clone()),
            notification_repository: NotificationRepository::new(db_pool.clone()),
            view_repository: ViewRepository::new(db_pool.clone()),
            db_pool,
            redis_pool,
            jwt_verifier,
        }
    }
}
