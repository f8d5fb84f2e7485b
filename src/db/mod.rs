//! Embedded SQLite persistence.

pub mod schema;
