//! Metadata engine
//!
//! Pure logic behind runtime-defined tables and columns: data-type dispatch,
//! generated names, dense position ordering, record payload maintenance,
//! join-table reconciliation and effective-permission merging. Repositories
//! feed it rows and persist what it decides.

use thiserror::Error;

pub mod data_type;
pub mod join;
pub mod naming;
pub mod ordering;
pub mod permissions;
pub mod record_data;

pub use data_type::{DataType, RelationType};
pub use permissions::{Action, PermissionFlags};

/// Errors raised by metadata rules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// Referenced entity does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Name or pair already taken
    #[error("{0}")]
    Conflict(String),

    /// Input rejected by a rule
    #[error("{0}")]
    Invalid(String),
}

impl MetadataError {
    pub fn not_found(what: impl Into<String>) -> Self {
        MetadataError::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        MetadataError::Conflict(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        MetadataError::Invalid(msg.into())
    }
}

/// Type alias for results of metadata rules
pub type MetadataResult<T> = Result<T, MetadataError>;
