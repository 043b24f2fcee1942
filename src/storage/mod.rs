//! Storage layer for arec
//!
//! One SQLite file holds the catalog records, their embeddings and the
//! index metadata.

pub mod migrations;
pub mod sqlite;

pub use sqlite::Database;
