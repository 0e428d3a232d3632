//! Tablero API service
//!
//! Dynamic tables, columns, records and the role permission matrix behind
//! them. The auth and notifier services reuse the repositories and the JWT
//! types exported here.

pub mod config;
pub mod error;
pub mod metadata;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod state;
