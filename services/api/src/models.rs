//! API models for request and response payloads

use serde::Deserialize;

pub mod collaborator;
pub mod column;
pub mod comment;
pub mod module;
pub mod notification;
pub mod permission;
pub mod record;
pub mod role;
pub mod table;
pub mod user;
pub mod view;

/// Body of the reposition endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct PositionUpdate {
    pub position: i32,
}
