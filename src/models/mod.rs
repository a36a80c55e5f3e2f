//! Core data models for the stamp catalog.
//!
//! These entities map to SQLite tables via `sqlx::FromRow` and serialize
//! as JSON via `serde`.

pub mod admin;
pub mod stamp;
