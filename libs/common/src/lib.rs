//! Common library for the Tablero workspace
//!
//! This crate provides shared functionality used across the Tablero services:
//! PostgreSQL pooling and migrations, the Redis cache client, and the shared
//! database error type.

pub mod cache;
pub mod database;
pub mod error;
